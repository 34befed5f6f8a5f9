pub mod automation;
pub mod handoff;
pub mod health;
pub mod mailbox;
pub mod messages;
pub mod pages;
pub mod profiles;
