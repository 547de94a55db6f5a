// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! External collaborators: payment gateway, object store, chat image source,
//! game server status.

pub mod discord;
pub mod gateway;
pub mod object_store;
pub mod server_status;
pub mod stripe;

pub use discord::{ChatImage, ChatImageSource, ChatSession, ChatSourceError, DiscordSource};
pub use gateway::{
    CheckoutRequest, CheckoutSession, GatewayError, PaymentGateway, UnconfiguredGateway,
};
pub use object_store::{FsObjectStore, ObjectStore, ObjectStoreError};
pub use server_status::{
    McStatusClient, OnlinePlayer, PlayerCounts, ServerStatus, ServerStatusSource,
    StatusSourceError,
};
pub use stripe::StripeClient;
