// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Diagnostics emitted with the `tracing` feature.
//!
//!   cargo test -p understory_conduction --features tracing --test tracing

#![cfg(feature = "tracing")]

use std::sync::{Arc, Mutex};

use tracing::Level;
use tracing::field::{Field, Visit};
use tracing_subscriber::layer::{Context, SubscriberExt};
use understory_conduction::{TopologySnapshot, TreeItem};

#[derive(Clone, Debug)]
struct Captured {
    name: String,
    level: Level,
    fields: Vec<(String, String)>,
}

impl Captured {
    fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Default)]
struct Fields(Vec<(String, String)>);

impl Visit for Fields {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.0.push((field.name().to_string(), format!("{value:?}")));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.0.push((field.name().to_string(), value.to_string()));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.0.push((field.name().to_string(), value.to_string()));
    }
}

#[derive(Clone, Default)]
struct Capture {
    spans: Arc<Mutex<Vec<Captured>>>,
    events: Arc<Mutex<Vec<Captured>>>,
}

impl<S> tracing_subscriber::Layer<S> for Capture
where
    S: tracing::Subscriber,
{
    fn on_new_span(
        &self,
        attrs: &tracing::span::Attributes<'_>,
        _id: &tracing::span::Id,
        _ctx: Context<'_, S>,
    ) {
        let mut fields = Fields::default();
        attrs.record(&mut fields);
        self.spans.lock().unwrap().push(Captured {
            name: attrs.metadata().name().to_string(),
            level: *attrs.metadata().level(),
            fields: fields.0,
        });
    }

    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let mut fields = Fields::default();
        event.record(&mut fields);
        self.events.lock().unwrap().push(Captured {
            name: event.metadata().name().to_string(),
            level: *event.metadata().level(),
            fields: fields.0,
        });
    }
}

fn capture<F: FnOnce()>(f: F) -> (Vec<Captured>, Vec<Captured>) {
    let capture = Capture::default();
    let subscriber = tracing_subscriber::registry().with(capture.clone());
    tracing::subscriber::with_default(subscriber, f);
    let spans = capture.spans.lock().unwrap().clone();
    let events = capture.events.lock().unwrap().clone();
    (spans, events)
}

#[test]
fn conduction_passes_open_spans() {
    let (spans, events) = capture(|| {
        let snapshot = TopologySnapshot::from_tree(&[TreeItem::branch(
            "a",
            [TreeItem::leaf("b"), TreeItem::leaf("c")],
        )]);
        let result = snapshot.conduct_check(["b"]);
        let _ = snapshot.conduct_uncheck(["b"], result.half_checked().iter().copied());
    });

    let build = spans
        .iter()
        .find(|span| span.name == "registry_build")
        .expect("registry build span");
    assert_eq!(build.level, Level::DEBUG);
    assert_eq!(build.field("source"), Some("tree"));

    let modes: Vec<_> = spans
        .iter()
        .filter(|span| span.name == "conduct")
        .filter_map(|span| span.field("mode"))
        .collect();
    assert_eq!(modes, ["check", "uncheck"]);
    assert!(events.is_empty(), "well-formed input warns about nothing");
}

#[test]
fn repairs_and_unknown_keys_warn() {
    let (_, events) = capture(|| {
        let snapshot =
            TopologySnapshot::from_parent_links([("a", None), ("b", Some("ghost")), ("a", None)]);
        let _ = snapshot.conduct_check(["a", "nowhere"]);
    });

    let warnings: Vec<_> = events.iter().filter(|e| e.level == Level::WARN).collect();
    let kinds: Vec<_> = warnings.iter().filter_map(|e| e.field("kind")).collect();
    assert_eq!(kinds, ["duplicate_key", "unresolved_parent"]);
    assert!(
        warnings
            .iter()
            .any(|e| e.field("count") == Some("1")),
        "unknown checked key is reported with its count"
    );
}
