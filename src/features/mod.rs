pub mod bot;
pub mod conversation;
pub mod notifications;
pub mod reports;
pub mod subscriptions;
