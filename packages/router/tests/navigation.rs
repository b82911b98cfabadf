//! Drives a [`Router`] through a [`MemoryPlatform`] the way a user would: clicking links, going
//! back and forward, and calling [`Router::route`].

use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use futures::FutureExt;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use spa_router::{history::ClickEvent, prelude::*};
use url::Url;

struct Harness {
    platform: Rc<MemoryPlatform>,
    router: Router,
    contexts: Rc<RefCell<Vec<NavigationContext>>>,
    errors: Rc<RefCell<Vec<NavigationError>>>,
}

fn url(raw: &str) -> Url {
    Url::parse(raw).unwrap()
}

impl Harness {
    fn new(url: &str) -> Self {
        let platform = Rc::new(MemoryPlatform::new(url.parse().unwrap()));
        Self {
            router: Router::new(platform.clone()),
            platform,
            contexts: Rc::default(),
            errors: Rc::default(),
        }
    }

    fn config(&self) -> RouterConfig {
        let errors = self.errors.clone();
        RouterConfig::default().on_unhandled_error(move |err| errors.borrow_mut().push(err))
    }

    /// Configure a handler that records every context and leaves committing to the router.
    fn listen(&self, first_run: bool) {
        let contexts = self.contexts.clone();
        self.router
            .configure(
                move |context: NavigationContext| {
                    contexts.borrow_mut().push(context);
                    async { anyhow::Ok(()) }
                },
                self.config().first_run(first_run),
            )
            .unwrap();
    }

    fn context(&self, index: usize) -> NavigationContext {
        self.contexts.borrow()[index].clone()
    }

    fn handled(&self) -> usize {
        self.contexts.borrow().len()
    }

    fn path(&self) -> String {
        self.platform.location().path().to_string()
    }
}

#[test]
fn first_run_revisits_the_initial_location() {
    let harness = Harness::new("http://localhost/start?x=1");
    harness.platform.replace_state(&json!({"restored": true}), None);
    harness.listen(true);

    assert_eq!(harness.handled(), 1);
    let context = harness.context(0);
    assert!(context.first_run());
    assert!(!context.is_navigation());
    assert_eq!(context.href(), "/start?x=1");
    assert_eq!(context.state(), json!({"restored": true}));

    harness.platform.run_until_stalled();
    let commit = context.ready().expect("first run commits");
    assert_eq!(commit.kind, CommitKind::Replace);
    assert_eq!(harness.platform.len(), 1);
    assert_eq!(harness.platform.history_state(), json!({"restored": true}));
    assert!(harness.errors.borrow().is_empty());
}

#[test]
fn first_run_can_be_skipped() {
    let harness = Harness::new("http://localhost/");
    harness.listen(false);
    assert_eq!(harness.handled(), 0);

    harness.platform.click_link("/foo");
    assert_eq!(harness.handled(), 1);
    assert!(!harness.context(0).first_run());
}

#[test]
fn clicks_commit_when_ready() {
    let harness = Harness::new("http://localhost/");
    harness.listen(false);

    assert!(harness.platform.click_link("/foo?bar=1"));
    let context = harness.context(0);
    assert!(context.is_navigation());
    assert_eq!(context.href(), "/foo?bar=1");
    assert_eq!(context.phase(), NavigationPhase::Pending);
    assert_eq!(harness.path(), "/");

    let commit = context.ready().expect("click commits");
    assert_eq!(commit.kind, CommitKind::Push);
    assert_eq!(harness.path(), "/foo");
    assert_eq!(harness.platform.len(), 2);

    // the router's own ready after the handler is a no-op now
    harness.platform.run_until_stalled();
    assert_eq!(harness.platform.len(), 2);
    assert!(harness.platform.loads().is_empty());
}

#[test]
fn handlers_can_redirect_before_committing() {
    let harness = Harness::new("http://localhost/");
    harness.listen(false);

    harness.platform.click_link("/foo");
    let context = harness.context(0);
    context.set_pathname("/foo-update");
    context.set_hash("top");
    context.ready();

    assert_eq!(harness.platform.location().as_str(), "http://localhost/foo-update#top");
}

#[test]
fn newer_navigations_preempt_older_ones() {
    let harness = Harness::new("http://localhost/");
    let outcomes = Rc::new(RefCell::new(Vec::new()));

    let platform = harness.platform.clone();
    let log = outcomes.clone();
    harness
        .router
        .configure(
            move |context: NavigationContext| {
                let platform = platform.clone();
                let log = log.clone();
                async move {
                    if context.pathname() == "/foo" {
                        platform.click_link("/bar");
                        assert!(context.signal().aborted());
                        assert_eq!(context.phase(), NavigationPhase::Aborted);
                        log.borrow_mut().push(("/foo", context.ready()));
                    } else {
                        context.set_state("fooB");
                    }
                    anyhow::Ok(())
                }
            },
            harness.config().first_run(false),
        )
        .unwrap();

    harness.platform.click_link("/foo");
    harness.platform.run_until_stalled();

    assert_eq!(outcomes.borrow().as_slice(), &[("/foo", None)]);
    assert_eq!(harness.path(), "/bar");
    assert_eq!(harness.platform.history_state(), json!("fooB"));
    assert_eq!(harness.platform.len(), 2);
    assert!(harness.errors.borrow().is_empty());
}

#[test]
fn only_the_latest_navigation_stays_live() {
    let harness = Harness::new("http://localhost/");
    harness.listen(false);

    let handles: Vec<_> = ["/a", "/b", "/c"]
        .into_iter()
        .map(|to| harness.router.route(to))
        .collect();

    let aborted: Vec<_> = (0..3)
        .map(|index| harness.context(index).signal().aborted())
        .collect();
    assert_eq!(aborted, vec![true, true, false]);

    harness.platform.run_until_stalled();
    assert_eq!(harness.path(), "/c");
    assert_eq!(harness.platform.len(), 2);
    for handle in handles {
        assert!(matches!(handle.now_or_never(), Some(Ok(()))));
    }
}

#[test]
fn previous_navigation_is_aborted_before_the_next_handler_runs() {
    let harness = Harness::new("http://localhost/");
    let observed = Rc::new(RefCell::new(Vec::new()));

    let contexts = harness.contexts.clone();
    let log = observed.clone();
    harness
        .router
        .configure(
            move |context: NavigationContext| {
                let previous = contexts.borrow().last().map(|previous| previous.signal().aborted());
                log.borrow_mut().push(previous);
                contexts.borrow_mut().push(context);
                async { anyhow::Ok(()) }
            },
            harness.config().first_run(false),
        )
        .unwrap();

    harness.platform.click_link("/foo");
    harness.platform.click_link("/bar");
    harness.platform.run_until_stalled();
    assert_eq!(harness.path(), "/bar");

    harness.platform.back();
    harness.router.reload();
    harness.platform.run_until_stalled();

    assert_eq!(*observed.borrow(), vec![None, Some(true), Some(true), Some(true)]);
    assert!(!harness.context(3).signal().aborted());
}

#[test]
fn interception_outlives_the_router_handle() {
    let harness = Harness::new("http://localhost/");
    harness.listen(false);

    let Harness {
        platform,
        router,
        contexts,
        ..
    } = harness;
    drop(router);

    assert!(platform.click_link("/foo"));
    platform.run_until_stalled();
    assert_eq!(platform.location().path(), "/foo");
    assert_eq!(contexts.borrow().len(), 1);
    assert!(platform.loads().is_empty());
}

#[test]
fn preempted_handlers_report_their_abort_once() {
    let harness = Harness::new("http://localhost/");
    harness
        .router
        .configure(
            |context: NavigationContext| async move {
                context.maybe_abort()?;
                context.ready();
                anyhow::Ok(())
            },
            harness.config().first_run(false),
        )
        .unwrap();

    harness.platform.click_link("/slow");
    harness.platform.click_link("/fast");
    harness.platform.run_until_stalled();

    assert_eq!(harness.path(), "/fast");
    let errors = harness.errors.borrow();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].is_aborted());
    assert!(harness.platform.loads().is_empty());
}

#[test]
fn history_pops_revisit_entries_with_their_state() {
    let harness = Harness::new("http://localhost/");
    harness.platform.replace_state(&json!(123), None);
    harness.listen(false);

    harness.platform.click_link("/foo");
    harness.context(0).set_state(json!({"abc": "def"}));
    harness.platform.run_until_stalled();
    assert_eq!(harness.platform.history_state(), json!({"abc": "def"}));

    harness.platform.back();
    assert_eq!(harness.handled(), 2);
    let back = harness.context(1);
    assert!(!back.is_navigation());
    assert_eq!(back.pathname(), "/");
    assert_eq!(back.state(), json!(123));

    // an uncommitted revisit writes straight through to its entry
    back.set_state("abc");
    assert_eq!(harness.platform.history_state(), json!("abc"));

    harness.platform.run_until_stalled();
    assert_eq!(back.ready().map(|commit| commit.kind), Some(CommitKind::Replace));
    back.set_state("ignored");
    assert_eq!(harness.platform.history_state(), json!("abc"));

    harness.platform.forward();
    assert_eq!(harness.handled(), 3);
    assert_eq!(harness.context(2).state(), json!({"abc": "def"}));
    harness.platform.run_until_stalled();
    assert_eq!(harness.platform.len(), 2);
}

#[test]
fn preempted_revisits_stop_writing_state() {
    let harness = Harness::new("http://localhost/");
    harness.listen(false);
    harness.platform.click_link("/foo");
    harness.platform.run_until_stalled();

    harness.platform.back();
    let back = harness.context(1);
    harness.platform.click_link("/bar");
    assert!(back.signal().aborted());

    back.set_state("stale");
    harness.platform.run_until_stalled();
    assert_eq!(harness.path(), "/bar");
    assert_eq!(harness.platform.history_state(), Value::Null);
    harness.platform.back();
    assert_eq!(harness.platform.history_state(), Value::Null);
}

#[test]
fn hash_routes_scroll_without_the_handler() {
    let harness = Harness::new("http://localhost/page");
    harness.platform.add_element("section", 400.0);
    harness.listen(false);

    let handle = harness.router.route("#section");
    assert!(matches!(handle.now_or_never(), Some(Ok(()))));
    assert_eq!(harness.handled(), 0);
    assert_eq!(harness.platform.scroll_top(), 400.0);
    assert_eq!(harness.platform.location().as_str(), "http://localhost/page#section");
    assert_eq!(harness.platform.len(), 2);

    harness.platform.back();
    assert_eq!(harness.handled(), 0);
}

#[test]
fn hash_clicks_are_left_to_the_platform() {
    let harness = Harness::new("http://localhost/page");
    harness.platform.add_element("intro", 80.0);
    harness.listen(false);

    assert!(!harness.platform.click_link("#intro"));
    assert_eq!(harness.platform.scroll_top(), 80.0);
    assert_eq!(harness.platform.len(), 2);
    // the native hash change pops, but the document did not change
    assert_eq!(harness.handled(), 0);
}

#[test]
fn clicks_that_open_elsewhere_are_ignored() {
    let harness = Harness::new("http://localhost/");
    harness.listen(false);

    let plain = ClickEvent::on_link("/foo");
    for click in [
        ClickEvent { ctrl_key: true, ..plain.clone() },
        ClickEvent { meta_key: true, ..plain.clone() },
        ClickEvent { shift_key: true, ..plain.clone() },
        ClickEvent { button: 1, ..plain.clone() },
        plain.clone().with_target("_blank"),
    ] {
        assert!(!harness.platform.click(click));
    }
    assert_eq!(harness.handled(), 0);
    assert!(harness.platform.loads().is_empty());

    assert!(!harness.platform.click_link("http://other.example/foo"));
    assert!(!harness.platform.click_link("/download.zip"));
    assert_eq!(harness.handled(), 0);
    assert_eq!(harness.platform.loads().len(), 2);
}

#[test]
fn committed_navigations_scroll_to_their_fragment() {
    let harness = Harness::new("http://localhost/");
    harness.platform.add_element("target", 250.0);
    harness.listen(false);

    harness.platform.click_link("/page#target");
    harness.platform.run_until_stalled();
    assert_eq!(harness.platform.scroll_top(), 250.0);

    harness.platform.click_link("/other");
    harness.platform.run_until_stalled();
    assert_eq!(harness.platform.scroll_top(), 0.0);
}

#[test]
fn ready_handlers_run_after_the_history_write() {
    let harness = Harness::new("http://localhost/");
    harness.platform.add_element("details", 90.0);
    let rendered = Rc::new(RefCell::new(Vec::new()));

    let platform = harness.platform.clone();
    let log = rendered.clone();
    harness
        .router
        .configure(
            move |context: NavigationContext| {
                let platform = platform.clone();
                let log = log.clone();
                async move {
                    let render = {
                        let platform = platform.clone();
                        let log = log.clone();
                        move || {
                            log.borrow_mut()
                                .push((platform.location().path().to_string(), platform.scroll_top()));
                            async { anyhow::Ok(()) }
                        }
                    };
                    let commit = context.ready_with(render).await?;
                    assert_eq!(commit.map(|commit| commit.href()), Some("/item#details".to_string()));
                    assert_eq!(platform.scroll_top(), 90.0);

                    let again = context
                        .ready_with(|| {
                            log.borrow_mut().push(("courtesy".to_string(), 0.0));
                            async { anyhow::Ok(()) }
                        })
                        .await?;
                    assert!(again.is_some());
                    anyhow::Ok(())
                }
            },
            harness.config().first_run(false),
        )
        .unwrap();

    harness.platform.click_link("/item#details");
    harness.platform.run_until_stalled();

    assert_eq!(
        rendered.borrow().as_slice(),
        &[("/item".to_string(), 0.0), ("courtesy".to_string(), 0.0)]
    );
    assert_eq!(harness.platform.len(), 2);
    assert!(harness.errors.borrow().is_empty());
}

#[test]
fn failed_handlers_reload_the_target() {
    let harness = Harness::new("http://localhost/");
    harness
        .router
        .configure(
            |_context: NavigationContext| async { Err::<(), _>(anyhow::anyhow!("boom")) },
            harness.config().first_run(false),
        )
        .unwrap();

    harness.platform.click_link("/broken");
    harness.platform.run_until_stalled();

    assert_eq!(harness.path(), "/");
    assert_eq!(
        harness.platform.loads(),
        vec![url("http://localhost/broken")]
    );
    let errors = harness.errors.borrow();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].to_string(), "navigation handler failed: boom");
}

#[test]
fn failed_first_runs_do_not_reload() {
    let harness = Harness::new("http://localhost/");
    harness
        .router
        .configure(
            |_context: NavigationContext| async { Err::<(), _>(anyhow::anyhow!("boom")) },
            harness.config(),
        )
        .unwrap();
    harness.platform.run_until_stalled();

    assert!(harness.platform.loads().is_empty());
    assert_eq!(harness.errors.borrow().len(), 1);
}

#[test]
fn route_handles_receive_the_outcome() {
    let harness = Harness::new("http://localhost/");
    let fail = Rc::new(Cell::new(false));
    let failing = fail.clone();
    harness
        .router
        .configure(
            move |_context: NavigationContext| {
                let fail = failing.get();
                async move {
                    if fail {
                        anyhow::bail!("no such page");
                    }
                    anyhow::Ok(())
                }
            },
            harness.config().first_run(false),
        )
        .unwrap();

    let handle = harness.router.route("/foo");
    harness.platform.run_until_stalled();
    assert!(matches!(handle.now_or_never(), Some(Ok(()))));
    assert_eq!(harness.path(), "/foo");

    fail.set(true);
    let handle = harness.router.route("/missing");
    harness.platform.run_until_stalled();
    match handle.now_or_never() {
        Some(Err(NavigationError::Handler(err))) => assert_eq!(err.to_string(), "no such page"),
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!(harness.errors.borrow().is_empty());

    // nobody is waiting on a dropped handle, so its error goes to the hook
    drop(harness.router.route("/gone"));
    harness.platform.run_until_stalled();
    assert_eq!(harness.errors.borrow().len(), 1);
}

#[test]
fn routes_the_router_does_not_take_over_are_loaded() {
    let harness = Harness::new("http://localhost/");
    harness.listen(false);

    let result = harness.router.route("https://elsewhere.example/").now_or_never();
    assert!(matches!(result, Some(Err(NavigationError::NotIntercepted(_)))));

    let result = harness.router.route("/report.pdf").now_or_never();
    assert!(matches!(result, Some(Err(NavigationError::NotIntercepted(_)))));

    let result = harness.router.route("http://[::1").now_or_never();
    assert!(matches!(result, Some(Err(NavigationError::InvalidUrl(_)))));

    assert_eq!(harness.handled(), 0);
    assert_eq!(
        harness.platform.loads(),
        vec![
            url("https://elsewhere.example/"),
            url("http://localhost/report.pdf"),
        ]
    );
}

#[test]
fn custom_validators_decide_what_is_intercepted() {
    let harness = Harness::new("http://localhost/app/");
    let contexts = harness.contexts.clone();
    harness
        .router
        .configure(
            move |context: NavigationContext| {
                contexts.borrow_mut().push(context);
                async { anyhow::Ok(()) }
            },
            harness
                .config()
                .first_run(false)
                .validate(|url| url.path().starts_with("/app/")),
        )
        .unwrap();

    assert!(harness.platform.click_link("/app/settings"));
    assert!(!harness.platform.click_link("/admin"));
    assert_eq!(harness.handled(), 1);
}

#[test]
fn unconfigured_routers_load_everything() {
    let harness = Harness::new("http://localhost/");
    assert!(!harness.router.is_listening());

    let result = harness.router.route("/foo").now_or_never();
    assert!(matches!(result, Some(Err(NavigationError::NotIntercepted(_)))));
    assert!(!harness.platform.click_link("/bar"));

    harness.router.reload();
    assert_eq!(
        harness.platform.loads(),
        vec![
            url("http://localhost/foo"),
            url("http://localhost/bar"),
            url("http://localhost/"),
        ]
    );
}

#[test]
fn configuring_twice_fails() {
    let harness = Harness::new("http://localhost/");
    harness.listen(false);
    assert!(harness.router.is_listening());

    let again = harness.router.configure(
        |_context: NavigationContext| async { anyhow::Ok(()) },
        RouterConfig::default(),
    );
    assert!(matches!(again, Err(RouterError::AlreadyConfigured)));
}

#[test]
fn reload_revisits_the_current_entry() {
    let harness = Harness::new("http://localhost/");
    harness.listen(false);
    harness.platform.click_link("/foo");
    harness.platform.run_until_stalled();

    harness.router.reload();
    let context = harness.context(1);
    assert!(!context.is_navigation());
    assert!(!context.first_run());
    assert_eq!(context.pathname(), "/foo");

    harness.platform.run_until_stalled();
    assert_eq!(context.ready().map(|commit| commit.kind), Some(CommitKind::Replace));
    assert_eq!(harness.platform.len(), 2);
    assert!(harness.platform.loads().is_empty());
}
