pub mod github;
pub mod rest;

#[cfg(test)]
pub mod mock;
