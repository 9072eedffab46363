//! Confirmation codes: the one-time numeric credential mailed at signup and
//! exchanged for an access token.

use rand::Rng;

use crate::{error::AppError, models::User};

pub const CODE_DIGITS: usize = 6;

/// Draws `CODE_DIGITS` decimal digits and folds them into an integer, so leading
/// zeros shorten the printed value (`004211` is `4211`). A draw that lands on
/// `sentinel` is repeated: the sentinel can never be redeemed.
pub fn generate_code<R: Rng>(rng: &mut R, sentinel: i32) -> i32 {
    loop {
        let code = (0..CODE_DIGITS).fold(0i32, |acc, _| acc * 10 + rng.gen_range(0..10));
        if code != sentinel {
            return code;
        }
    }
}

/// Checks a submitted code against the one stored on `user`.
///
/// The sentinel is rejected before comparison, so a consumed code stays
/// consumed even though the stored value now equals it.
pub fn verify_code(user: &User, submitted: i32, sentinel: i32) -> Result<(), AppError> {
    if submitted == sentinel {
        return Err(AppError::non_field(
            "This confirmation code has already been used.",
        ));
    }
    if user.confirmation_code != Some(submitted) {
        return Err(AppError::non_field("Invalid confirmation code."));
    }
    Ok(())
}
