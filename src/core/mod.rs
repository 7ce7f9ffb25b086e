pub mod api_error;
pub mod batch;
pub mod diff_index;
pub mod diff_parser;
pub mod error;
pub mod export;
pub mod filter;
pub mod git;
pub mod listing;
pub mod planner;
pub mod request;
pub mod submitter;
pub mod suggestion;
pub mod validator;
pub mod workflow;
