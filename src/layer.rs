use crate::core::Core;
use crate::entry::{Entry, EntryCaller};
use crate::field::Field;
use crate::level::Level;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::field::{Field as TracingField, Visit};
use tracing::span::{Attributes, Id, Record};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::{LookupSpan, SpanRef};

/// `tracing_subscriber` layer that drives a [`Core`].
///
/// Span fields become scoped context. Each span keeps the fields recorded on
/// it; the core an event is written through is derived from the root core by
/// applying, via [`Core::with`], the fields of every span from the root of
/// the event's scope down to its innermost span. Derived cores are cached per
/// span and rebuilt after any span records new values, so a value recorded
/// on a parent reaches events in children created earlier.
///
/// Events emitted by this crate itself (producer diagnostics) are ignored so
/// that delivery problems never feed back into the pipeline.
pub struct LogStoreLayer {
    root: Arc<dyn Core>,
    /// Bumped by every `on_record`; cached cores from older epochs are stale.
    epoch: AtomicU64,
    /// Total events seen by the layer (before level filtering).
    pub total_events: Arc<AtomicU64>,
    /// Events accepted by a core and written without error.
    pub written_events: Arc<AtomicU64>,
    /// Events whose encoding or submission failed.
    pub failed_events: Arc<AtomicU64>,
    /// Span field sets that could not be applied to a core; events inside
    /// such spans are written without those fields.
    pub failed_scopes: Arc<AtomicU64>,
}

/// Fields recorded on one span and the core last derived from them.
struct SpanScope {
    fields: Vec<Field>,
    cached: Option<(u64, Arc<dyn Core>)>,
}

impl LogStoreLayer {
    pub fn new(core: impl Core + 'static) -> Self {
        Self::from_arc(Arc::new(core))
    }

    pub fn from_arc(root: Arc<dyn Core>) -> Self {
        LogStoreLayer {
            root,
            epoch: AtomicU64::new(0),
            total_events: Arc::new(AtomicU64::new(0)),
            written_events: Arc::new(AtomicU64::new(0)),
            failed_events: Arc::new(AtomicU64::new(0)),
            failed_scopes: Arc::new(AtomicU64::new(0)),
        }
    }

    /// The core events outside of any span are written to.
    pub fn root(&self) -> &Arc<dyn Core> {
        &self.root
    }

    /// Core for `span`, rebuilt from the root of its scope where stale.
    fn scoped_core<S>(&self, span: Option<SpanRef<'_, S>>) -> Arc<dyn Core>
    where
        S: Subscriber + for<'span> LookupSpan<'span>,
    {
        let mut core = Arc::clone(&self.root);
        let Some(span) = span else {
            return core;
        };
        let epoch = self.epoch.load(Ordering::Acquire);
        for s in span.scope().from_root() {
            let mut ext = s.extensions_mut();
            let Some(scope) = ext.get_mut::<SpanScope>() else {
                continue;
            };
            if let Some((at, cached)) = &scope.cached {
                if *at == epoch {
                    core = Arc::clone(cached);
                    continue;
                }
            }
            match core.with(&scope.fields) {
                Ok(derived) => {
                    core = Arc::from(derived);
                    scope.cached = Some((epoch, Arc::clone(&core)));
                }
                Err(e) => {
                    self.failed_scopes.fetch_add(1, Ordering::Relaxed);
                    eprintln!("failed to scope log fields: {}", e);
                }
            }
        }
        core
    }
}

fn is_own_target(target: &str) -> bool {
    let crate_name = module_path!().split("::").next().unwrap_or_default();
    target.split("::").next() == Some(crate_name)
}

impl<S> Layer<S> for LogStoreLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut visitor = FieldVisitor::default();
        attrs.record(&mut visitor);
        if visitor.fields.is_empty() {
            return;
        }

        span.extensions_mut().insert(SpanScope {
            fields: visitor.fields,
            cached: None,
        });
    }

    fn on_record(&self, id: &Id, values: &Record<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut visitor = FieldVisitor::default();
        values.record(&mut visitor);
        if visitor.fields.is_empty() {
            return;
        }

        let mut ext = span.extensions_mut();
        match ext.get_mut::<SpanScope>() {
            Some(scope) => scope.fields.extend(visitor.fields),
            None => ext.insert(SpanScope {
                fields: visitor.fields,
                cached: None,
            }),
        }
        // Descendants cached a core without these values.
        self.epoch.fetch_add(1, Ordering::AcqRel);
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        self.total_events.fetch_add(1, Ordering::Relaxed);
        let meta = event.metadata();
        if is_own_target(meta.target()) {
            return;
        }

        let level = Level::from(*meta.level());
        let core = self.scoped_core(ctx.event_span(event));
        if !core.enabled(level) {
            return;
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let mut entry = Entry::new(level, visitor.message.unwrap_or_default())
            .with_logger_name(meta.target());
        if let (Some(file), Some(line)) = (meta.file(), meta.line()) {
            entry = entry.with_caller(EntryCaller::new(
                file,
                line,
                meta.module_path().unwrap_or_default(),
            ));
        }

        let Some(checked) = core.check(&entry, None) else {
            return;
        };
        match checked.write(&visitor.fields) {
            Ok(()) => {
                self.written_events.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.failed_events.fetch_add(1, Ordering::Relaxed);
                eprintln!("failed to write log entry: {}", e);
            }
        }
    }
}

/// Collects tracing field values as typed [`Field`]s; the `message` field is
/// kept apart.
#[derive(Default)]
pub struct FieldVisitor {
    pub fields: Vec<Field>,
    pub message: Option<String>,
}

impl Visit for FieldVisitor {
    fn record_f64(&mut self, field: &TracingField, value: f64) {
        self.fields.push(Field::f64(field.name(), value));
    }

    fn record_i64(&mut self, field: &TracingField, value: i64) {
        self.fields.push(Field::i64(field.name(), value));
    }

    fn record_u64(&mut self, field: &TracingField, value: u64) {
        self.fields.push(Field::u64(field.name(), value));
    }

    fn record_i128(&mut self, field: &TracingField, value: i128) {
        self.fields.push(Field::string(field.name(), value.to_string()));
    }

    fn record_u128(&mut self, field: &TracingField, value: u128) {
        self.fields.push(Field::string(field.name(), value.to_string()));
    }

    fn record_bool(&mut self, field: &TracingField, value: bool) {
        self.fields.push(Field::bool(field.name(), value));
    }

    fn record_str(&mut self, field: &TracingField, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.fields.push(Field::string(field.name(), value));
        }
    }

    fn record_error(&mut self, field: &TracingField, value: &(dyn std::error::Error + 'static)) {
        self.fields.push(Field::string(field.name(), value.to_string()));
    }

    fn record_debug(&mut self, field: &TracingField, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{:?}", value));
        } else {
            self.fields.push(Field::string(field.name(), format!("{:?}", value)));
        }
    }
}
