pub mod applescript_server;
pub mod tools;
