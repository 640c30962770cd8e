use serde_json::{Value, json};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::*;
use crate::bus::{ChannelBus, Delivery, EventBus, SpoolBus, Subscription};
use crate::error::{Error, Result};
use crate::event::{Action, EventType};
use crate::ledger::MemoryLedger;
use crate::mention::{InboundMentions, OutboundMentions, outbound_key};
use crate::post::Target;
use crate::render::{TOMBSTONE_TITLE, TemplateSet};
use crate::test_utils::{FakeTransport, TestSite};

const HELLO_URL: &str = "https://bear.im/bearlog/2024/070/hello-world.html";
const FRIEND: &str = "https://friend.example/";

struct Harness {
    site: TestSite,
    ledger: Arc<MemoryLedger>,
    bus: Arc<dyn EventBus>,
    transport: Arc<FakeTransport>,
    dispatcher: Dispatcher,
}

fn harness() -> Harness {
    harness_with(|_| Arc::new(ChannelBus::new()))
}

fn harness_with(bus: impl FnOnce(&TestSite) -> Arc<dyn EventBus>) -> Harness {
    let mut site = TestSite::new();
    site.config.events.poll_interval_ms = 10;
    let ledger = Arc::new(MemoryLedger::new());
    let bus = bus(&site);
    let transport = Arc::new(FakeTransport::new());
    let services = Services {
        ledger: ledger.clone(),
        bus: bus.clone(),
        transport: transport.clone(),
    };
    let dispatcher = Dispatcher::new(site.config.clone(), TemplateSet::embedded(), services);
    Harness {
        site,
        ledger,
        bus,
        transport,
        dispatcher,
    }
}

impl Harness {
    fn publish(&self, kind: EventType, action: Option<Action>, data: Value) -> EventKey {
        self.dispatcher
            .publisher()
            .publish(&Envelope::new(kind, action, data))
            .unwrap()
    }

    fn drain(&self) -> WorkerStats {
        let mut sub = self.bus.subscribe(&self.site.config.events.channel).unwrap();
        Worker::new(&self.dispatcher).drain(sub.as_mut()).unwrap()
    }

    fn create_hello(&self, content: &str) -> EventKey {
        self.publish(
            EventType::Post,
            Some(Action::Create),
            json!({
                "slug": "hello-world",
                "title": "Hello World",
                "timestamp": "2024-03-10 10:00:00",
                "micropub": {"content": [content], "category": ["indieweb"]},
            }),
        )
    }

    fn update_hello(&self, actionkey: &str, micropub: Value) -> EventKey {
        self.publish(
            EventType::Post,
            Some(Action::Update),
            json!({"url": HELLO_URL, "actionkey": actionkey, "micropub": micropub}),
        )
    }

    fn hello(&self) -> Target {
        Target::new(self.site.config.paths.content.join("2024/070/hello-world"))
    }

    fn output(&self, rel: &str) -> PathBuf {
        self.site.config.paths.output.join(rel)
    }

    fn read_output(&self, rel: &str) -> String {
        fs::read_to_string(self.output(rel)).unwrap()
    }
}

#[test]
fn test_micropub_create_end_to_end() {
    let h = harness();
    let key = h.create_hello("Hello there, [friend](https://friend.example/).");
    let stats = h.drain();
    assert_eq!(stats.handled, 1);

    let target = h.hello();
    assert!(target.md().is_file());
    assert!(target.json().is_file());
    assert!(target.html().is_file());

    let post = h.dispatcher.store().load(&target).unwrap();
    assert_eq!(post.title, "Hello World");
    assert_eq!(post.published, post.created);
    assert!(post.tags.contains("indieweb"));
    assert!(post.uuid.is_some());
    assert!(post.updated.is_none());

    let page = h.read_output("2024/070/hello-world.html");
    assert!(page.contains("<title>Hello World | Test</title>"));
    assert!(page.contains(r#"<a href="https://friend.example/">friend</a>"#));
    assert!(h.read_output("index.html").contains(HELLO_URL));

    // handled payloads linger for the retention window only
    assert!(h.ledger.ttl(key.as_str()).unwrap().is_some());
    assert!(!h.ledger.exists(&key.failed_key()).unwrap());
}

#[test]
fn test_index_lists_newest_first() {
    let h = harness();
    h.create_hello("first");
    h.publish(
        EventType::Post,
        Some(Action::Create),
        json!({
            "slug": "later",
            "title": "Later",
            "timestamp": "2024-04-01 09:00:00",
            "micropub": {"content": ["second"]},
        }),
    );
    assert_eq!(h.drain().handled, 2);

    let index = h.read_output("index.html");
    let later = index.find("https://bear.im/bearlog/2024/092/later.html").unwrap();
    let hello = index.find(HELLO_URL).unwrap();
    assert!(later < hello);
}

#[test]
fn test_create_is_idempotent() {
    let h = harness();
    h.create_hello("first body");
    h.drain();
    let before = h.dispatcher.store().load(&h.hello()).unwrap();

    // a replayed create must not clobber the content file
    h.create_hello("second body");
    assert_eq!(h.drain().handled, 1);
    let after = h.dispatcher.store().load(&h.hello()).unwrap();
    assert_eq!(after.content, "first body");
    assert_eq!(after.uuid, before.uuid);
}

#[test]
fn test_soft_delete_round_trip() {
    let h = harness();
    h.create_hello("body");
    h.drain();

    h.publish(EventType::Post, Some(Action::Delete), json!({"url": HELLO_URL}));
    assert_eq!(h.drain().handled, 1);
    let target = h.hello();
    assert!(target.deleted().exists());
    let page = h.read_output("2024/070/hello-world.html");
    assert!(page.contains(TOMBSTONE_TITLE));
    assert!(page.contains("410 GONE"));
    assert!(!h.read_output("index.html").contains(HELLO_URL));
    assert!(h.dispatcher.store().load(&target).unwrap().deleted.is_some());

    h.publish(EventType::Post, Some(Action::Undelete), json!({"url": HELLO_URL}));
    assert_eq!(h.drain().handled, 1);
    assert!(!target.deleted().exists());
    let page = h.read_output("2024/070/hello-world.html");
    assert!(page.contains("<title>Hello World | Test</title>"));
    assert!(h.read_output("index.html").contains(HELLO_URL));
    assert!(h.dispatcher.store().load(&target).unwrap().deleted.is_none());
}

#[test]
fn test_undelete_of_live_post_is_noop() {
    let h = harness();
    h.create_hello("body");
    h.drain();
    h.publish(EventType::Post, Some(Action::Undelete), json!({"url": HELLO_URL}));
    assert_eq!(h.drain().handled, 1);
    assert!(!h.hello().deleted().exists());
}

#[test]
fn test_update_replace_and_unchanged() {
    let h = harness();
    h.create_hello("old body");
    h.drain();

    h.update_hello("replace", json!({"content": ["new body"], "category": ["rust"]}));
    assert_eq!(h.drain().handled, 1);
    let post = h.dispatcher.store().load(&h.hello()).unwrap();
    assert_eq!(post.content, "new body");
    assert!(post.tags.contains("indieweb") && post.tags.contains("rust"));
    let updated = post.updated.unwrap();
    assert!(fs::read_to_string(h.hello().md()).unwrap().contains("new body"));
    assert!(h.read_output("2024/070/hello-world.html").contains("new body"));

    // same content, known tag: nothing to do
    h.update_hello("replace", json!({"content": ["new body"], "category": ["rust"]}));
    assert_eq!(h.drain().handled, 1);
    let post = h.dispatcher.store().load(&h.hello()).unwrap();
    assert_eq!(post.updated, Some(updated));
}

#[test]
fn test_update_delete_clears_tags() {
    let h = harness();
    h.create_hello("body");
    h.drain();
    h.update_hello("delete", json!(["category"]));
    assert_eq!(h.drain().handled, 1);
    assert!(h.dispatcher.store().load(&h.hello()).unwrap().tags.is_empty());
}

#[test]
fn test_update_of_unknown_post_is_skipped() {
    let h = harness();
    let key = h.update_hello("replace", json!({"content": ["x"]}));
    let stats = h.drain();
    assert_eq!(stats.skipped, 1);
    assert!(h.ledger.ttl(key.as_str()).unwrap().is_some());
}

#[test]
fn test_outbound_mentions_follow_content() {
    let h = harness();
    h.transport.endpoint(FRIEND, "https://friend.example/webmention");
    h.create_hello("Hello [friend](https://friend.example/).");
    h.drain();
    assert_eq!(h.transport.sent_targets(), vec![FRIEND.to_string()]);
    assert!(h.ledger.exists(&outbound_key(HELLO_URL, FRIEND)).unwrap());

    // a forced gather re-renders without resending
    h.publish(EventType::Gather, None, json!({"force": true}));
    assert_eq!(h.drain().handled, 2);
    assert_eq!(h.transport.sends().len(), 1);

    // dropping the link notifies the target once more, then forgets it
    h.update_hello("replace", json!({"content": ["No links anymore."]}));
    h.drain();
    assert_eq!(h.transport.sends().len(), 2);
    assert!(!h.ledger.exists(&outbound_key(HELLO_URL, FRIEND)).unwrap());
    assert!(OutboundMentions::load(&h.hello().outbound()).unwrap().is_empty());

    h.update_hello("replace", json!({"content": ["Back to [friend](https://friend.example/)."]}));
    h.drain();
    assert_eq!(h.transport.sends().len(), 3);
}

fn mention(name: &str) -> Value {
    json!({
        "sourceURL": "https://ann.example/reply",
        "targetURL": HELLO_URL,
        "postDate": "2024-03-11T08:30:00",
        "hcard": {"name": name, "url": "https://ann.example/"},
    })
}

#[test]
fn test_inbound_mention_lifecycle() {
    let h = harness();
    h.create_hello("body");
    h.drain();
    let source = "https://ann.example/reply";
    h.transport.page(source, 200, "<p>reply</p>");

    h.publish(EventType::Mention, Some(Action::Create), mention("Ann"));
    assert_eq!(h.drain().handled, 1);
    let inbound = InboundMentions::load(&h.hello().mentions()).unwrap();
    assert_eq!(inbound.len(), 1);
    assert!(h.read_output("2024/070/hello-world.html").contains("Ann"));

    // same source: updated in place
    h.publish(EventType::Mention, Some(Action::Update), mention("Ann B."));
    h.drain();
    let inbound = InboundMentions::load(&h.hello().mentions()).unwrap();
    assert_eq!(inbound.len(), 1);
    assert!(h.read_output("2024/070/hello-world.html").contains("Ann B."));

    // the source went away: the next render drops it
    h.transport.page(source, 410, "");
    h.publish(EventType::Mention, Some(Action::Delete), mention("Ann B."));
    h.drain();
    assert!(InboundMentions::load(&h.hello().mentions()).unwrap().is_empty());
    assert!(!h.read_output("2024/070/hello-world.html").contains("Ann B."));
}

#[test]
fn test_mention_of_unknown_post_is_skipped() {
    let h = harness();
    h.publish(EventType::Mention, Some(Action::Create), mention("Ann"));
    assert_eq!(h.drain().skipped, 1);
}

#[test]
fn test_persistence_failure_is_recorded_and_replayed() {
    let h = harness();
    // a file where the year directory should go
    fs::create_dir_all(h.output("")).unwrap();
    fs::write(h.output("2024"), "").unwrap();

    let key = h.create_hello("body");
    let stats = h.drain();
    assert_eq!(stats.failed, 1);
    let record: Value =
        serde_json::from_str(&h.ledger.get(&key.failed_key()).unwrap().unwrap()).unwrap();
    assert_eq!(record["key"], json!(key.as_str()));
    assert_eq!(record["operation"], json!("post create"));
    assert!(h.ledger.ttl(key.as_str()).unwrap().is_none());

    fs::remove_file(h.output("2024")).unwrap();
    let replayed = replay(h.ledger.as_ref(), h.dispatcher.publisher()).unwrap();
    assert_eq!(replayed, vec![key.as_str().to_string()]);
    assert_eq!(h.drain().handled, 1);
    assert!(h.output("2024/070/hello-world.html").is_file());
    assert!(!h.ledger.exists(&key.failed_key()).unwrap());
    assert!(replay(h.ledger.as_ref(), h.dispatcher.publisher()).unwrap().is_empty());
}

#[test]
fn test_foreign_and_broken_keys() {
    let h = harness();
    assert_eq!(h.dispatcher.handle_key("something else"), EventOutcome::Ignored);
    assert!(matches!(
        h.dispatcher.handle_key("kaku-event::post::create::nope"),
        EventOutcome::Skipped(_)
    ));

    let broken = "kaku-event::post::create::broken";
    h.ledger.set(broken, "{not json").unwrap();
    assert!(matches!(h.dispatcher.handle_key(broken), EventOutcome::Skipped(_)));
    assert!(h.ledger.ttl(broken).unwrap().is_some());
}

#[test]
fn test_gather_feeds_the_worker() {
    let h = harness();
    h.site.write_md(
        "2024/070/manual",
        "Title: Manual\nCreated: 2024-03-10 12:00:00\n\nWritten by hand.",
    );
    h.publish(EventType::Gather, None, json!({}));
    let stats = h.drain();
    assert_eq!(stats.handled, 2);

    let target = Target::new(h.site.config.paths.content.join("2024/070/manual"));
    assert!(target.json().is_file());
    assert!(h.read_output("2024/070/manual.html").contains("Written by hand."));

    // nothing changed since
    h.publish(EventType::Gather, None, Value::Null);
    assert_eq!(h.drain().handled, 1);
}

fn spool_harness() -> Harness {
    harness_with(|site| Arc::new(SpoolBus::new(site.dir.path().join("spool"))))
}

#[test]
fn test_undecodable_spool_message_does_not_stop_the_worker() {
    let h = spool_harness();
    let channel = h.site.dir.path().join("spool").join(&h.site.config.events.channel);
    fs::create_dir_all(&channel).unwrap();
    // sorts ahead of anything published now
    let garbage = channel.join("00000000000000000000-000000-1.evt");
    fs::write(&garbage, [0xff, 0xfe, 0x00]).unwrap();

    h.create_hello("body");
    let stats = h.drain();
    assert_eq!(stats.handled, 1);
    assert_eq!(stats.bus_errors, 0);
    assert!(h.output("2024/070/hello-world.html").is_file());
    assert!(garbage.with_extension("bad").is_file());

    // nothing left to trip over on the next start
    assert_eq!(h.drain().total(), 0);
}

/// Fails every other receive and every ack, passing real deliveries through.
struct FlakySubscription {
    inner: Box<dyn Subscription>,
    calls: Arc<AtomicUsize>,
}

impl Subscription for FlakySubscription {
    fn next(&mut self, timeout: Duration) -> Result<Option<Delivery>> {
        if self.calls.fetch_add(1, Ordering::SeqCst) % 2 == 0 {
            return Err(Error::io("spool", std::io::Error::other("device gone")));
        }
        self.inner.next(timeout)
    }

    fn ack(&mut self, _delivery: &Delivery) -> Result<()> {
        Err(Error::io("spool", std::io::Error::other("read-only")))
    }
}

#[test]
fn test_worker_survives_bus_errors() {
    let h = harness();
    let calls = Arc::new(AtomicUsize::new(0));
    let mut sub = FlakySubscription {
        inner: h.bus.subscribe(&h.site.config.events.channel).unwrap(),
        calls: calls.clone(),
    };
    h.create_hello("body");

    let stats = Worker::new(&h.dispatcher)
        .run(&mut sub, || calls.load(Ordering::SeqCst) >= 4)
        .unwrap();
    assert_eq!(stats.handled, 1);
    // two refused receives and one refused ack
    assert_eq!(stats.bus_errors, 3);
    assert!(h.output("2024/070/hello-world.html").is_file());
}
