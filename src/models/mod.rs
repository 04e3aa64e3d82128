pub mod login_attempt;
