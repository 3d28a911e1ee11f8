//! Scheduler failure modes and the tracing events they emit.

use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use formwork_reactive::{Reaction, ReactiveError, Runtime, RuntimeConfig, Value};
use tracing::Subscriber;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

#[derive(Debug, Clone, Default)]
struct Captured {
    level: Option<tracing::Level>,
    target: String,
    message: Option<String>,
    generations: Option<u64>,
    discarded: Option<u64>,
}

#[derive(Default)]
struct EventCapture {
    events: Arc<Mutex<Vec<Captured>>>,
}

impl<S> Layer<S> for EventCapture
where
    S: Subscriber + for<'lookup> tracing_subscriber::registry::LookupSpan<'lookup>,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        struct Fields(Captured);
        impl tracing::field::Visit for Fields {
            fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
                match field.name() {
                    "generations" => self.0.generations = Some(value),
                    "discarded" => self.0.discarded = Some(value),
                    _ => {}
                }
            }

            fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
                if field.name() == "message" {
                    self.0.message = Some(value.to_string());
                }
            }

            fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
                if field.name() == "message" {
                    self.0.message = Some(format!("{value:?}").trim_matches('"').to_string());
                }
            }
        }

        let mut fields = Fields(Captured {
            level: Some(*event.metadata().level()),
            target: event.metadata().target().to_string(),
            ..Captured::default()
        });
        event.record(&mut fields);
        self.events.lock().expect("capture lock").push(fields.0);
    }
}

fn capture() -> (Arc<Mutex<Vec<Captured>>>, tracing::subscriber::DefaultGuard) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let subscriber = tracing_subscriber::registry().with(EventCapture {
        events: Arc::clone(&events),
    });
    (events, tracing::subscriber::set_default(subscriber))
}

/// Two reactions that each bump the other's input once `on` is set.
fn ping_pong(rt: &Runtime) -> (Value<bool>, Reaction, Reaction) {
    let on = rt.value(false);
    let ping = rt.value(0u32);
    let pong = rt.value(0u32);

    let (o, src, dst, r) = (on.clone(), ping.clone(), pong.clone(), rt.clone());
    let forward = rt.autorun(move || {
        let v = src.get();
        if o.get() {
            r.run_in_action(|| dst.set(v + 1));
        }
    });
    let (o, src, dst, r) = (on.clone(), pong, ping, rt.clone());
    let backward = rt.autorun(move || {
        let v = src.get();
        if o.get() {
            r.run_in_action(|| dst.set(v + 1));
        }
    });
    (on, forward, backward)
}

#[test]
fn mutually_rescheduling_reactions_stop_at_the_cap() {
    let (events, _guard) = capture();
    let rt = Runtime::with_config(RuntimeConfig::default().with_max_drain_generations(10));
    let (on, forward, backward) = ping_pong(&rt);

    let outcome = rt.try_run_in_action(|| on.set(true));
    assert_eq!(
        outcome,
        Err((
            (),
            ReactiveError::RunawayDrain {
                generations: 10,
                discarded: 1
            }
        ))
    );
    assert_eq!(rt.stats().runaways, 1);
    assert_eq!(rt.pending_count(), 0);
    assert!(!forward.is_pending());
    assert!(!backward.is_pending());

    let events = events.lock().expect("capture lock");
    let runaway = events
        .iter()
        .find(|e| e.message.as_deref() == Some("reaction drain exceeded generation cap"))
        .expect("runaway event");
    assert_eq!(runaway.level, Some(tracing::Level::ERROR));
    assert_eq!(runaway.target, "formwork::scheduler");
    assert_eq!(runaway.generations, Some(10));
    assert_eq!(runaway.discarded, Some(1));
}

#[test]
fn reaction_writing_its_own_input_does_not_loop() {
    let rt = Runtime::new();
    let counter = rt.value(0u32);
    let (c, r) = (counter.clone(), rt.clone());
    let spinner = rt.autorun(move || {
        let v = c.get();
        if v > 0 {
            r.run_in_action(|| c.set(v + 1));
        }
    });

    rt.run_in_action(|| counter.set(1));
    assert_eq!(counter.get(), 2);
    assert_eq!(spinner.run_count(), 2);
    assert_eq!(rt.stats().runaways, 0);
}

#[test]
fn runtime_keeps_working_after_a_runaway() {
    let rt = Runtime::with_config(RuntimeConfig::default().with_max_drain_generations(3));
    let (on, _forward, _backward) = ping_pong(&rt);
    rt.run_in_action(|| on.set(true));
    assert_eq!(rt.stats().runaways, 1);

    let calm = rt.value("a");
    let seen = Rc::new(RefCell::new(Vec::new()));
    let (cc, sink) = (calm.clone(), Rc::clone(&seen));
    let _reader = rt.autorun(move || sink.borrow_mut().push(cc.get()));
    rt.run_in_action(|| calm.set("b"));
    assert_eq!(*seen.borrow(), vec!["a", "b"]);
}

#[test]
fn action_events_follow_config() {
    let (events, _guard) = capture();
    let quiet = Runtime::with_config(RuntimeConfig::default().with_action_logging(false));
    quiet.run_in_action(|| {});
    assert!(events.lock().expect("capture lock").is_empty());

    let loud = Runtime::new();
    loud.run_in_action(|| loud.run_in_action(|| {}));
    let events = events.lock().expect("capture lock");
    let actions: Vec<_> = events
        .iter()
        .filter(|e| e.target == "formwork::action")
        .filter_map(|e| e.message.clone())
        .collect();
    assert_eq!(
        actions,
        vec!["action started", "action started", "action ended", "action ended"]
    );
}

#[test]
fn panicking_action_logs_and_still_drains() {
    let (events, _guard) = capture();
    let rt = Runtime::new();
    let item = rt.value(0);
    let seen = Rc::new(RefCell::new(Vec::new()));
    let (ic, sink) = (item.clone(), Rc::clone(&seen));
    let _reaction = rt.autorun(move || sink.borrow_mut().push(ic.get()));

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        rt.run_in_action(|| {
            item.set(1);
            panic!("validation blew up");
        })
    }));
    assert!(result.is_err());
    assert_eq!(*seen.borrow(), vec![0, 1]);
    assert_eq!(rt.batch_depth(), 0);

    let events = events.lock().expect("capture lock");
    assert!(events.iter().any(|e| {
        e.level == Some(tracing::Level::ERROR)
            && e.message.as_deref() == Some("action panicked; closing batch before unwinding")
    }));
}

#[test]
fn panicking_reaction_leaves_the_rest_of_its_generation_schedulable() {
    let rt = Runtime::new();
    let item = rt.value(0);
    let seen = Rc::new(RefCell::new(Vec::new()));

    let ic = item.clone();
    let _faulty = rt.autorun(move || {
        if ic.get() == 1 {
            panic!("reaction blew up");
        }
    });
    let (ic, sink) = (item.clone(), Rc::clone(&seen));
    let healthy = rt.autorun(move || sink.borrow_mut().push(ic.get()));

    let result = panic::catch_unwind(AssertUnwindSafe(|| rt.run_in_action(|| item.set(1))));
    assert!(result.is_err());
    assert!(!healthy.is_pending());
    assert_eq!(rt.pending_count(), 0);
    assert_eq!(rt.batch_depth(), 0);
    assert_eq!(*seen.borrow(), vec![0]);

    rt.run_in_action(|| item.set(2));
    assert_eq!(*seen.borrow(), vec![0, 2]);
    assert_eq!(healthy.run_count(), 2);
}
