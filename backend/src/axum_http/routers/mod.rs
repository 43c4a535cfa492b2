pub mod account_email;
pub mod email_auth;
pub mod password_auth;
pub mod session;
pub mod student_registration;
pub mod subscriptions;

#[cfg(test)]
mod tests;
