pub mod create_user_web_input;
pub mod statistics_response;
