//! # Example: Event Hierarchy
//!
//! Registers static and instance listeners on a small hierarchy,
//! fires events of each level and unregisters an object.
//!
//! Run with `RUST_LOG=hierbus=debug` to see registration and cache activity,
//! and `HIERBUS_STRATEGY=direct` to switch backends.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use hierbus::{BusConfig, Class, EventBus, EventType, Methods, Subscriber, Supertypes, Target};

/// Root of the hierarchy.
struct AppEvent {
    at: u64,
}
impl EventType for AppEvent {}

/// Marker shared by user-facing events.
struct UserFacing {
    user: &'static str,
}
impl EventType for UserFacing {}

struct Login {
    app: AppEvent,
    facing: UserFacing,
}
impl EventType for Login {
    fn supertypes(types: &mut Supertypes<Self>) {
        types
            .extends(|l: &Login| &l.app)
            .extends(|l: &Login| &l.facing);
    }
}

struct Audit;
impl Subscriber for Audit {
    fn declare<S: Subscriber>(m: &mut Methods<'_, S, Self>) {
        m.on_static("any", |e: &AppEvent| println!("[audit] event at {}", e.at))
            .on_static("login", |e: &Login| println!("[audit] login by {}", e.facing.user));
    }
}

#[derive(Default)]
struct Sessions {
    open: AtomicUsize,
}
impl Subscriber for Sessions {
    fn declare<S: Subscriber>(m: &mut Methods<'_, S, Self>) {
        m.on("login", |this: &Sessions, e: &Login| {
            let open = this.open.fetch_add(1, Ordering::SeqCst) + 1;
            println!("[sessions] {} logged in, {open} open", e.facing.user);
        })
        // UserFacing is not an AppEvent; skipped on this bus.
        .on("greet", |_: &Sessions, e: &UserFacing| println!("hello {}", e.user));
    }
}

fn login(at: u64, user: &'static str) -> Login {
    Login {
        app: AppEvent { at },
        facing: UserFacing { user },
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let bus = EventBus::builder(Class::of::<AppEvent>())
        .config(BusConfig::from_env()?)
        .build();
    println!("{bus:?}");

    bus.register(Target::of_type::<Audit>())?;
    let sessions = Arc::new(Sessions::default());
    let added = bus.register(&sessions)?;
    println!("sessions contributed {added} listener(s)");

    bus.post(&login(1, "ann"))?;
    bus.post(&AppEvent { at: 2 })?;

    bus.unregister(&sessions);
    bus.post(&login(3, "bob"))?;

    println!("open sessions: {}", sessions.open.load(Ordering::SeqCst));
    Ok(())
}
