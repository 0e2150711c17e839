//! # xopay-notify-queue
//!
//! The inbound side of the notify service: a reconnecting AMQP consumer
//! plus one handler per queue.
//!
//! Delivery is at-least-once up to the ack: a message is acknowledged after
//! its handler returns, whatever the outcome, so handlers whose downstream
//! side effects matter must be idempotent. Undecodable messages are logged
//! and acknowledged too, so a poison message never blocks a queue.

pub mod consumer;
pub mod error;
pub mod handlers;

pub use consumer::{AmqpSettings, QueueConsumer, QueueHandler, QueueNames};
pub use error::QueueError;
pub use handlers::{EmailHandler, RequestHandler, SmsHandler, TransactionHandler};
