//! End-to-end scenarios: a store, a provider, connected consumers and a
//! scripted host.

use std::cell::RefCell;
use std::error::Error;
use std::fmt;
use std::rc::Rc;

use cascade_connect::{
    ConnectError, ConnectOptions, Connected, ConnectedInstance, FnComponent, InstanceState,
    Provider, WrapperProps, connect,
};
use cascade_core::{BatchStrategy, Dispatch, StoreHandle};
use cascade_harness::{MemoryStore, RenderMode, ScriptedHost};
use cascade_select::{Mapper, Merge, PropsShape, StageKind};

#[derive(Debug, Clone, PartialEq, Default)]
struct AppState {
    count: u32,
    x: u32,
    y: u32,
}

enum Action {
    Increment,
    SetX(u32),
    SetY(u32),
}

fn reduce(state: &Rc<AppState>, action: Action) -> Rc<AppState> {
    let mut next = (**state).clone();
    match action {
        Action::Increment => next.count += 1,
        Action::SetX(x) => next.x = x,
        Action::SetY(y) => next.y = y,
    }
    if next == **state {
        Rc::clone(state)
    } else {
        Rc::new(next)
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Field(u32);
impl PropsShape for Field {}

type Log = Rc<RefCell<Vec<String>>>;
type Probe = FnComponent<Field, u32>;
type FieldConsumer = Connected<AppState, Action, (), Field, Probe>;
type FieldInstance = ConnectedInstance<AppState, Action, (), Field, Probe>;

struct App {
    store: Rc<MemoryStore<AppState, Action>>,
    handle: StoreHandle<AppState, Action>,
    host: Rc<ScriptedHost>,
    provider: Provider<AppState, Action>,
    log: Log,
}

impl App {
    fn new(mode: RenderMode) -> Self {
        let host = ScriptedHost::new(mode);
        let (store, handle) = MemoryStore::shared(AppState::default(), reduce, host.as_batch());
        let provider = Provider::new(handle.clone(), host.as_batch());
        provider.attach();
        Self {
            store,
            handle,
            host,
            provider,
            log: Rc::new(RefCell::new(Vec::new())),
        }
    }

    fn consumer(&self, name: &'static str, read: fn(&AppState) -> u32) -> FieldConsumer {
        let select_log = Rc::clone(&self.log);
        let render_log = Rc::clone(&self.log);
        connect(
            Mapper::unary(move |s: &AppState| {
                select_log.borrow_mut().push(format!("select {name}"));
                Field(read(s))
            }),
            Mapper::constant(()),
            Merge::state_props(),
            ConnectOptions::default(),
        )
        .wrap(FnComponent::new(name, move |f: &Rc<Field>, _| {
            render_log.borrow_mut().push(format!("render {name}"));
            f.0
        }))
        .unwrap()
    }

    fn mount_root(&self, consumer: &FieldConsumer) -> FieldInstance {
        consumer
            .mount(
                WrapperProps::new(()),
                Some(&self.provider.context()),
                self.host.as_host(),
            )
            .unwrap()
    }

    fn mount_under(&self, consumer: &FieldConsumer, parent: &FieldInstance) -> FieldInstance {
        consumer
            .mount(
                WrapperProps::new(()),
                parent.child_context().as_ref(),
                self.host.as_host(),
            )
            .unwrap()
    }

    fn take_log(&self) -> Vec<String> {
        std::mem::take(&mut *self.log.borrow_mut())
    }
}

#[test]
fn increment_recomputes_and_renders_once() {
    let app = App::new(RenderMode::Immediate);
    let counter = app.mount_root(&app.consumer("Counter", |s| s.count));
    assert_eq!(*counter.last_output().unwrap(), 0);
    assert_eq!(app.take_log(), vec!["select Counter", "render Counter"]);

    app.handle.dispatch(Action::Increment);

    assert_eq!(app.take_log(), vec!["select Counter", "render Counter"]);
    assert_eq!(app.host.requests(), vec!["Connect(Counter)"]);
    assert_eq!(*counter.derived_props().unwrap(), Field(1));
    assert_eq!(*counter.last_output().unwrap(), 1);
}

#[test]
fn unchanged_parent_lets_changed_child_render() {
    let app = App::new(RenderMode::Immediate);
    let x = app.mount_root(&app.consumer("X", |s| s.x));
    let y = app.mount_under(&app.consumer("Y", |s| s.y), &x);
    app.take_log();

    app.handle.dispatch(Action::SetY(5));

    assert_eq!(app.host.renders(), vec!["Connect(Y)"]);
    assert_eq!(app.take_log(), vec!["select X", "select Y", "render Y"]);
    assert_eq!(*y.last_output().unwrap(), 5);
    assert_eq!(*x.last_output().unwrap(), 0);
}

#[test]
fn ancestors_commit_before_descendants_recompute() {
    let app = App::new(RenderMode::Deferred);
    let a = app.mount_root(&app.consumer("A", |s| s.count));
    let b = app.mount_under(&app.consumer("B", |s| s.count), &a);
    let _c = app.mount_under(&app.consumer("C", |s| s.count), &b);
    app.take_log();

    app.handle.dispatch(Action::Increment);
    assert_eq!(app.take_log(), vec!["select A"], "descendants wait for A");
    assert_eq!(app.host.pending(), 1);

    app.host.flush();
    assert_eq!(
        app.take_log(),
        vec![
            "render A", "select B", "render B", "select C", "render C"
        ]
    );
    assert_eq!(
        app.host.renders(),
        vec!["Connect(A)", "Connect(B)", "Connect(C)"]
    );
}

#[test]
fn siblings_render_in_mount_order() {
    let app = App::new(RenderMode::Immediate);
    let parent = app.mount_root(&app.consumer("Parent", |s| s.x));
    let _first = app.mount_under(&app.consumer("First", |s| s.count), &parent);
    let _second = app.mount_under(&app.consumer("Second", |s| s.count), &parent);

    app.handle.dispatch(Action::Increment);
    assert_eq!(app.host.renders(), vec!["Connect(First)", "Connect(Second)"]);
}

#[test]
fn batched_dispatches_render_once() {
    let app = App::new(RenderMode::Immediate);
    let counter = app.mount_root(&app.consumer("Counter", |s| s.count));

    app.host.batch(&mut || {
        app.handle.dispatch(Action::Increment);
        app.handle.dispatch(Action::Increment);
    });

    assert_eq!(app.host.renders(), vec!["Connect(Counter)"]);
    assert_eq!(app.host.requests().len(), 2);
    assert_eq!(*counter.last_output().unwrap(), 2);
}

#[derive(Debug)]
struct Overflow;

impl fmt::Display for Overflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("count overflowed")
    }
}

impl Error for Overflow {}

fn fragile(app: &App) -> FieldInstance {
    connect(
        Mapper::try_unary(|s: &AppState| {
            if s.count > 0 {
                Err(Overflow)
            } else {
                Ok(Field(s.count))
            }
        }),
        Mapper::constant(()),
        Merge::state_props(),
        ConnectOptions::default(),
    )
    .wrap(FnComponent::new("Fragile", |f: &Rc<Field>, _| f.0))
    .unwrap()
    .mount(
        WrapperProps::new(()),
        Some(&app.provider.context()),
        app.host.as_host(),
    )
    .unwrap()
}

#[test]
fn mapper_error_is_returned_by_next_render() {
    let app = App::new(RenderMode::Deferred);
    let fragile = fragile(&app);

    app.handle.dispatch(Action::Increment);
    assert_eq!(app.host.pending(), 1, "an error also requests a render");

    let first = fragile.render().unwrap_err();
    let thrown = first.as_select().cloned().unwrap();
    assert!(thrown.source.downcast_ref::<Overflow>().is_some());

    app.host.flush();
    let failures = app.host.take_failures();
    assert_eq!(failures.len(), 1);
    assert!(
        failures[0]
            .error
            .as_select()
            .is_some_and(|e| e.same(&thrown)),
        "the exact latched error, not a recomputed one"
    );
}

#[test]
fn mapper_error_surfaces_at_unmount() {
    let app = App::new(RenderMode::Deferred);
    let fragile = fragile(&app);

    app.handle.dispatch(Action::Increment);
    let err = fragile.unmount().unwrap_err();
    assert!(matches!(err, ConnectError::Select(_)));
    assert_eq!(fragile.state(), InstanceState::TornDown);

    app.host.flush();
    assert!(app.host.take_failures().is_empty(), "stale render ignored");
}

#[test]
fn unmounted_child_ignores_parent_commit() {
    let app = App::new(RenderMode::Deferred);
    let parent = app.mount_root(&app.consumer("Parent", |s| s.count));
    let child = app.mount_under(&app.consumer("Child", |s| s.count), &parent);
    app.take_log();

    app.handle.dispatch(Action::Increment);
    child.unmount().unwrap();
    app.host.flush();

    assert_eq!(app.take_log(), vec!["select Parent", "render Parent"]);
    assert_eq!(parent.subscription().unwrap().nested_count(), 0);
}

#[test]
fn swapping_store_resubscribes() {
    let app = App::new(RenderMode::Immediate);
    let (other, other_handle) =
        MemoryStore::shared(AppState::default(), reduce, app.host.as_batch());
    other_handle.dispatch(Action::SetX(9));

    let consumer = app.consumer("Swapped", |s| s.x);
    let instance = consumer
        .mount(
            WrapperProps::new(()).with_store(app.handle.clone()),
            None,
            app.host.as_host(),
        )
        .unwrap();
    assert_eq!(app.store.listener_count(), 2, "provider root and instance");

    instance
        .set_props(WrapperProps::new(()).with_store(other_handle.clone()))
        .unwrap();
    assert_eq!(*instance.last_output().unwrap(), 9);
    assert_eq!(app.store.listener_count(), 1);
    assert_eq!(other.listener_count(), 1);

    app.host.clear_log();
    app.handle.dispatch(Action::SetX(1));
    assert!(app.host.renders().is_empty());
    other_handle.dispatch(Action::SetX(2));
    assert_eq!(app.host.renders(), vec!["Connect(Swapped)"]);
    assert_eq!(*instance.last_output().unwrap(), 2);
}

#[derive(Clone)]
struct Controls {
    value: u32,
    increment: Dispatch<Action>,
}

impl PartialEq for Controls {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value && self.increment.same(&other.increment)
    }
}

#[derive(Clone)]
struct Actions(Dispatch<Action>);

impl PartialEq for Actions {
    fn eq(&self, other: &Self) -> bool {
        self.0.same(&other.0)
    }
}

impl PropsShape for Actions {}

#[test]
fn dispatch_props_drive_the_store() {
    let app = App::new(RenderMode::Immediate);
    let connected = connect(
        Mapper::unary(|s: &AppState| Field(s.count)),
        Mapper::unary(|d: &Dispatch<Action>| Actions(d.clone())),
        Merge::new(|sp: &Field, dp: &Actions, _: &()| Controls {
            value: sp.0,
            increment: dp.0.clone(),
        }),
        ConnectOptions::default(),
    )
    .wrap(FnComponent::new("Button", |c: &Rc<Controls>, _| {
        (c.value, c.increment.clone())
    }))
    .unwrap();
    let button = connected
        .mount(
            WrapperProps::new(()),
            Some(&app.provider.context()),
            app.host.as_host(),
        )
        .unwrap();

    let (_, increment) = (*button.last_output().unwrap()).clone();
    increment.dispatch(Action::Increment);
    increment.dispatch(Action::Increment);

    assert_eq!(button.last_output().unwrap().0, 2);
    assert_eq!(app.store.dispatch_count(), 2);
    let (_, after) = (*button.last_output().unwrap()).clone();
    assert!(after.same(&increment), "dispatch props keep their identity");
}

#[test]
fn stage_error_message_names_consumer() {
    let app = App::new(RenderMode::Deferred);
    let fragile = fragile(&app);
    app.handle.dispatch(Action::Increment);
    let err = fragile.render().unwrap_err();
    assert_eq!(
        err.to_string(),
        "map_state_to_props failed in Connect(Fragile): count overflowed"
    );
    assert_eq!(err.as_select().unwrap().stage, StageKind::MapState);
}
