//! # Event Bus Module
//!
//! Publish/subscribe channel for decoupled communication between the board
//! services of one canvas session.
//!
//! ## Overview
//!
//! - Publishers emit typed [`CanvasEvent`]s without knowing subscribers
//! - Subscribers filter by [`EventCategory`] and receive events of interest
//! - Supports both synchronous handlers and async `broadcast` receivers
//!
//! Each canvas session owns its own bus; there is no process-wide instance.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use taskcanvas_core::event_bus::{CanvasEvent, EventBus, EventCategory, EventFilter};
//!
//! let bus = EventBus::new();
//! let subscription = bus.subscribe(
//!     EventFilter::Categories(vec![EventCategory::Position]),
//!     |event| {
//!         if let CanvasEvent::Position(position) = event {
//!             println!("position event: {}", position.description());
//!         }
//!     },
//! );
//!
//! bus.unsubscribe(subscription);
//! ```

mod bus;
mod events;

pub use bus::*;
pub use events::*;
