//! profitdash: Subscription Lifecycle and Workspace Backend
//!
//! Backend library for a profitability dashboard used by e-commerce
//! merchants. It owns the trial and paid subscription lifecycle, plan
//! entitlements, and the workspace data (connected stores, tracked ad
//! campaigns, sticky notes, daily profit metrics) that the lifecycle gates.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐      ┌──────────────────────┐
//! │  profitdash-server  │      │  LifecycleScheduler  │
//! │  (axum handlers)    │      │  (tokio intervals)   │
//! └──────────┬──────────┘      └──────────┬───────────┘
//!            │                            │
//! ┌──────────▼────────────────────────────▼───────────┐
//! │                  AccountService                   │
//! │  ┌──────────────┐ ┌────────────┐ ┌─────────────┐  │
//! │  │ subscription │ │ workspace  │ │  security   │  │
//! │  │ (typestate,  │ │ (stores,   │ │ (tokens,    │  │
//! │  │  status)     │ │  notes..)  │ │  audit)     │  │
//! │  └──────────────┘ └────────────┘ └─────────────┘  │
//! └──────────────────────────┬────────────────────────┘
//!                            │
//!                 ┌──────────▼──────────┐
//!                 │  AccountStore trait │  MemoryStore
//!                 └─────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```rust
//! use chrono::Utc;
//! use profitdash::{
//!     config::LifecycleConfig,
//!     service::AccountService,
//!     store::MemoryStore,
//!     subscription::{PlanCatalog, UserId},
//! };
//!
//! # async fn example() -> profitdash::Result<()> {
//! let service = AccountService::new(MemoryStore::new(), PlanCatalog::default(), LifecycleConfig::default());
//! let user = UserId::new("user-1")?;
//!
//! // A new account has no plan and is read-only until one is chosen.
//! let status = service.account_status(&user, Utc::now()).await?;
//! assert!(status.read_only);
//!
//! let status = service.start_trial(&user, Utc::now()).await?;
//! assert_eq!(status.trial.days_remaining, 14);
//!
//! let entitlements = service.entitlements(&user, Utc::now()).await?;
//! assert!(entitlements.can_add_store);
//! # Ok(())
//! # }
//! ```
//!
//! # Subscription Lifecycle
//!
//! Paid subscriptions move `active → expired → suspended → archived`.
//! Expiry opens a grace period; suspension schedules archival. Every state
//! except `active` is read-only. Transitions are encoded as a typestate in
//! [`subscription::Subscription`], so only valid moves compile:
//!
//! ```rust
//! use chrono::{Duration, Utc};
//! use profitdash::subscription::{PlanCode, Subscription, UserId};
//!
//! # fn example() -> profitdash::Result<()> {
//! let now = Utc::now();
//! let active = Subscription::start(UserId::new("user-1")?, PlanCode::new("pro")?, now, now + Duration::days(30))?;
//! let expired = active.expire(now, now, 7);
//! let suspended = expired.suspend(now, 30);
//! assert!(suspended.data().read_only());
//! # Ok(())
//! # }
//! ```
//!
//! Due transitions are applied by the scheduled sweep
//! ([`service::AccountService::run_lifecycle_sweep`]); operators can force
//! any state through [`service::AccountService::force_subscription_state`].
//!
//! # Module Organization
//!
//! - [`subscription`]: plans, profiles, lifecycle typestate, status and entitlements
//! - [`service`]: account operations over a store
//! - [`store`]: storage trait and in-memory backend
//! - [`scheduler`]: periodic trial checks and lifecycle sweeps
//! - [`connections`]: Shopify stores and Facebook ad campaigns
//! - [`notes`]: sticky notes board
//! - [`dashboard`]: daily metrics and profit summaries
//! - [`security`]: bearer token verification and audit logging
//! - [`reliability`]: retry with exponential backoff
//! - [`config`]: TOML configuration
//! - [`error`]: error types
//!
//! # Error Handling
//!
//! All operations return [`Result<T>`](error::Result):
//!
//! ```rust
//! use chrono::Utc;
//! use profitdash::{
//!     ProfitdashError,
//!     config::LifecycleConfig,
//!     connections::{ConnectStoreRequest, ShopDomain},
//!     service::AccountService,
//!     store::MemoryStore,
//!     subscription::{PlanCatalog, UserId},
//! };
//!
//! # async fn example() -> profitdash::Result<()> {
//! let service = AccountService::new(MemoryStore::new(), PlanCatalog::default(), LifecycleConfig::default());
//! let user = UserId::new("user-1")?;
//! let request = ConnectStoreRequest { shop_domain: ShopDomain::new("acme.myshopify.com")? };
//!
//! match service.connect_store(&user, request, Utc::now()).await {
//!     Ok(store) => println!("connected {}", store.shop_domain.as_str()),
//!     Err(ProfitdashError::ReadOnly(reason)) => eprintln!("locked: {reason}"),
//!     Err(ProfitdashError::LimitReached(msg)) => eprintln!("upgrade needed: {msg}"),
//!     Err(e) => eprintln!("other error: {e}"),
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod config;
pub mod connections;
pub mod dashboard;
pub mod error;
pub mod notes;
pub mod reliability;
pub mod scheduler;
pub mod security;
pub mod service;
pub mod store;
pub mod subscription;

pub use error::{ProfitdashError, Result};
pub use scheduler::LifecycleScheduler;
pub use service::AccountService;
