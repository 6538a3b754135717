//! # Ticket Resale Core
//!
//! Core traits and types for the ticket resale engine.
//!
//! The engine follows the reducer pattern: every operation on the ticket book is an
//! action handed to a reducer together with the current state and an environment of
//! injected collaborators. The reducer mutates state in place and returns descriptions
//! of the side effects that should follow (notifications, outcome reporting). The
//! runtime crate executes those descriptions.
//!
//! ## Core Concepts
//!
//! - **State**: the ticket book owned by one store
//! - **Action**: all inputs to a reducer (commands and the outcome events they produce)
//! - **Reducer**: `(State, Action, Environment) → (State, Effects)`
//! - **Effect**: a side effect description, executed later by the runtime
//! - **Environment**: injected dependencies (clock, ledger, payments, ...)
//!
//! ## Example
//!
//! ```ignore
//! use ticket_resale_core::{effect::Effect, reducer::Reducer, SmallVec};
//!
//! impl Reducer for TicketReducer {
//!     type State = TicketState;
//!     type Action = TicketAction;
//!     type Environment = TicketEnvironment;
//!
//!     fn reduce(
//!         &self,
//!         state: &mut TicketState,
//!         action: TicketAction,
//!         env: &TicketEnvironment,
//!     ) -> SmallVec<[Effect<TicketAction>; 4]> {
//!         SmallVec::new()
//!     }
//! }
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use smallvec::{smallvec, SmallVec};

/// Reducer module - the trait holding all business logic
pub mod reducer {
    use super::effect::Effect;
    use smallvec::SmallVec;

    /// The Reducer trait - core abstraction for business logic
    ///
    /// # Type Parameters
    ///
    /// - `State`: The domain state this reducer operates on
    /// - `Action`: The action type this reducer processes
    /// - `Environment`: The injected dependencies this reducer needs
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The environment type with injected dependencies
        type Environment;

        /// Reduce an action into state changes and effects
        ///
        /// Implementations:
        /// 1. Validate the action against current state
        /// 2. Update state in place (or leave it untouched on rejection)
        /// 3. Return effect descriptions for the runtime to execute
        ///
        /// Most actions produce at most a handful of effects, so the return type
        /// keeps up to four inline.
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]>;
    }
}

/// Effect module - side effect descriptions
///
/// Effects are values. Returning one from a reducer does nothing by itself; the
/// Store runtime executes it after the reducer has released the state.
pub mod effect {
    use std::future::Future;
    use std::pin::Pin;

    /// Effect type - describes a side effect to be executed
    ///
    /// # Type Parameters
    ///
    /// - `Action`: The action type that effects can produce (feedback loop)
    pub enum Effect<Action> {
        /// No-op effect
        None,

        /// Run effects concurrently
        Parallel(Vec<Effect<Action>>),

        /// Arbitrary async computation
        ///
        /// Returns `Option<Action>` - if Some, the action is broadcast to observers
        /// and fed back into the reducer
        Future(Pin<Box<dyn Future<Output = Option<Action>> + Send>>),
    }

    // Manual Debug implementation since Future doesn't implement Debug
    impl<Action> std::fmt::Debug for Effect<Action>
    where
        Action: std::fmt::Debug,
    {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Effect::None => write!(f, "Effect::None"),
                Effect::Parallel(effects) => {
                    f.debug_tuple("Effect::Parallel").field(effects).finish()
                },
                Effect::Future(_) => write!(f, "Effect::Future(<future>)"),
            }
        }
    }

    impl<Action> Effect<Action>
    where
        Action: Send + 'static,
    {
        /// Combine effects to run concurrently
        #[must_use]
        pub const fn merge(effects: Vec<Effect<Action>>) -> Effect<Action> {
            Effect::Parallel(effects)
        }

        /// An effect that immediately yields `action` back to the store
        #[must_use]
        pub fn send(action: Action) -> Effect<Action> {
            Effect::Future(Box::pin(async move { Some(action) }))
        }

        /// An effect that runs `f` once and produces no feedback action
        ///
        /// Used for fire-and-forget deliveries such as observer notifications.
        #[must_use]
        pub fn fire_and_forget<F>(f: F) -> Effect<Action>
        where
            F: FnOnce() + Send + 'static,
        {
            Effect::Future(Box::pin(async move {
                f();
                None
            }))
        }

        /// Number of leaf effects, counting through `Parallel`
        #[must_use]
        pub fn leaf_count(&self) -> usize {
            match self {
                Effect::None => 0,
                Effect::Future(_) => 1,
                Effect::Parallel(effects) => effects.iter().map(Effect::leaf_count).sum(),
            }
        }
    }
}

/// Environment module - Dependency injection traits
///
/// All external dependencies are abstracted behind traits and injected
/// via the Environment parameter.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// Implementations must be monotonically non-decreasing.
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::effect::Effect;
    use super::environment::{Clock, SystemClock};

    #[test]
    fn test_system_clock_is_non_decreasing() {
        let clock = SystemClock;
        let first = clock.now();
        let second = clock.now();
        assert!(second >= first);
    }

    #[test]
    fn test_leaf_count_counts_through_parallel() {
        let effect: Effect<u8> = Effect::merge(vec![
            Effect::send(1),
            Effect::None,
            Effect::merge(vec![Effect::send(2), Effect::fire_and_forget(|| {})]),
        ]);
        assert_eq!(effect.leaf_count(), 3);
        assert_eq!(Effect::<u8>::None.leaf_count(), 0);
    }

    #[tokio::test]
    async fn test_send_effect_yields_action() {
        let Effect::Future(fut) = Effect::send(7_u8) else {
            panic!("send should build a Future effect");
        };
        assert_eq!(fut.await, Some(7));
    }

    #[tokio::test]
    async fn test_fire_and_forget_runs_once_without_feedback() {
        let (tx, rx) = std::sync::mpsc::channel();
        let Effect::<u8>::Future(fut) = Effect::fire_and_forget(move || {
            let _ = tx.send(());
        }) else {
            panic!("fire_and_forget should build a Future effect");
        };
        assert_eq!(fut.await, None);
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_debug_hides_future() {
        let effect: Effect<u8> = Effect::send(1);
        assert_eq!(format!("{effect:?}"), "Effect::Future(<future>)");
    }
}
