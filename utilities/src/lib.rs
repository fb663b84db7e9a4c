pub mod command_executor;
pub mod poll;
pub mod tcp_channel;
