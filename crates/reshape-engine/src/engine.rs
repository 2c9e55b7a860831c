use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use reshape_common::{Frame, skiprows::is_contiguous_prefix};
use reshape_events::{EventBus, Payload};
use reshape_io::{HandlerFactory, TableHandler, default_factory};

use crate::context::{DedupeConfig, DedupeStrategy, ProcessingContext};
use crate::dedupe::{ConcatDedupe, DropDedupe};
use crate::mapping::{Slot, collect_all_sources, default_output_path, output_columns, parse_source_id};
use crate::state::{State, default_state};
use crate::transform::apply_mapping;

const DEFAULT_CHUNK_SIZE: usize = 20_000;

/// Shared cooperative cancellation flag, checked at chunk boundaries.
#[derive(Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn clear(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// How a run ended. Each outcome corresponds to exactly one terminal event
/// (or none, for a guardrail skip).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// Guardrail: nothing to do, no terminal event.
    Skipped,
    Completed(PathBuf),
    Canceled(Option<PathBuf>),
    Failed,
}

enum Mode {
    Plain,
    Drop(DropDedupe),
    Concat(ConcatDedupe),
}

/// Orchestrates one streaming run: open, validate, transform, dedupe,
/// report and save. All collaborators are injected so tests can run against
/// private instances.
pub struct Processor {
    bus: Arc<EventBus>,
    state: Arc<State>,
    factory: Arc<HandlerFactory>,
    cancel: CancelToken,
}

impl Processor {
    pub fn new(bus: Arc<EventBus>, state: Arc<State>, factory: Arc<HandlerFactory>) -> Self {
        Self {
            bus,
            state,
            factory,
            cancel: CancelToken::new(),
        }
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> &Arc<State> {
        &self.state
    }

    fn status(&self, msg: impl Into<String>) {
        self.bus
            .emit_from("engine", "status.update", Payload::new().with("msg", msg.into()));
    }

    fn progress(&self, value: i64) {
        self.bus
            .emit_from("engine", "progress.update", Payload::new().with("value", value));
    }

    fn error(&self, msg: impl Into<String>) {
        self.bus
            .emit_from("engine", "processing.error", Payload::new().with("msg", msg.into()));
    }

    /// Execute the run described by `ctx`, emitting lifecycle events along
    /// the way. Exactly one terminal event is emitted unless the guardrail
    /// skips the run outright.
    pub fn run(&self, ctx: &ProcessingContext) -> RunOutcome {
        self.cancel.clear();

        let strict = self.state.control_bool("processing.strict");
        let strict_per_slot = self.state.control_bool("processing.strict_per_slot");
        let chunk_size =
            self.state.control_u64("processing.chunk_size", DEFAULT_CHUNK_SIZE as u64) as usize;
        let csv_delimiter = self
            .state
            .control_str("processing.csv_delimiter")
            .unwrap_or_else(|| ",".to_string());

        if ctx.source.is_empty() || ctx.mapping.is_empty() {
            self.status("Nothing to process: missing source or mapping.");
            return RunOutcome::Skipped;
        }

        let (path_str, sheet) = parse_source_id(&ctx.source);
        let path = PathBuf::from(&path_str);

        let mut input =
            match self.open_input(&path, sheet.as_deref(), &csv_delimiter, &ctx.skip_rows) {
                Ok(handler) => handler,
                Err(e) => {
                    self.status(format!("Failed to open source: {e}"));
                    self.error(e.to_string());
                    return RunOutcome::Failed;
                }
            };

        // Header probe; a failing probe downgrades validation to a warning.
        let headers = match input.get_headers(None) {
            Ok(h) => Some(h),
            Err(e) => {
                self.status(format!("Could not read headers for validation: {e}"));
                None
            }
        };

        if let Some(headers) = &headers
            && !self.enforce_strictness(&ctx.mapping, headers, strict, strict_per_slot)
        {
            return RunOutcome::Failed;
        }

        let dedupe = self.validated_dedupe(ctx.dedupe.as_ref(), headers.as_deref());

        let out_path = self
            .state
            .control_str("processing.output_path")
            .map(PathBuf::from)
            .unwrap_or_else(|| default_output_path(&path));
        let mut output = input.output_sibling();
        if let Some(d) = csv_delimiter.chars().next() {
            output.set_delimiter(d);
        }

        let total_rows = estimate_total_rows(input.as_mut(), (chunk_size * 5).max(1_000));

        self.status(format!(
            "Processing: {} -> {}",
            file_name(&path),
            file_name(&out_path)
        ));

        let started = Instant::now();
        let all_sources = collect_all_sources(&ctx.mapping);
        let mut mode = match dedupe {
            Some(config) if config.strategy == DedupeStrategy::Drop => {
                Mode::Drop(DropDedupe::new(config.key.clone(), &all_sources))
            }
            Some(config) => Mode::Concat(ConcatDedupe::new(
                config.key.clone(),
                &all_sources,
                &config.concat_sep,
            )),
            None => Mode::Plain,
        };

        let chunks = match input.iter_load(chunk_size) {
            Ok(chunks) => chunks,
            Err(e) => {
                self.status(format!("Processing error: {e}"));
                self.error(e.to_string());
                return RunOutcome::Failed;
            }
        };

        let mut total_processed: usize = 0;
        let mut any_data = false;
        let mut canceled = false;

        for chunk in chunks {
            if self.cancel.is_set() {
                self.status("Processing canceled by user.");
                canceled = true;
                break;
            }
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    self.status(format!("Processing error: {e}"));
                    self.error(e.to_string());
                    return RunOutcome::Failed;
                }
            };
            let rows = chunk.len();
            match &mut mode {
                Mode::Plain => {
                    append_mapped(output.as_mut(), &ctx.mapping, &chunk, &mut any_data)
                }
                Mode::Drop(dedupe) => {
                    // A chunk without the key column cannot be deduped;
                    // it flows through the plain path instead.
                    if !dedupe.absorb(&chunk) {
                        append_mapped(output.as_mut(), &ctx.mapping, &chunk, &mut any_data)
                    }
                }
                Mode::Concat(dedupe) => {
                    if !dedupe.absorb(&chunk) {
                        append_mapped(output.as_mut(), &ctx.mapping, &chunk, &mut any_data)
                    }
                }
            }
            total_processed += rows;
            self.progress(progress_value(total_processed, total_rows, chunk_size));
        }

        // Aggregated dedup output is mapped once, after the last chunk.
        match mode {
            Mode::Plain => {}
            Mode::Drop(dedupe) => {
                if !dedupe.is_empty() {
                    let aggregate = dedupe.finish();
                    append_mapped(output.as_mut(), &ctx.mapping, &aggregate, &mut any_data);
                }
            }
            Mode::Concat(dedupe) => {
                if dedupe.key_count() > 0 {
                    let aggregate = dedupe.finish();
                    append_mapped(output.as_mut(), &ctx.mapping, &aggregate, &mut any_data);
                }
            }
        }

        if !any_data {
            // Headers-only output so the written file still carries the
            // mapped column row.
            let mut names: Vec<String> = Vec::new();
            for name in output_columns(&ctx.mapping) {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
            match Frame::empty_with_columns(names) {
                Ok(empty) => {
                    if let Err(e) = output.append_frame(&empty) {
                        tracing::warn!(error = %e, "could not buffer header-only output");
                    }
                }
                Err(e) => tracing::warn!(error = %e, "could not build header-only output"),
            }
        }

        if let Err(e) = self.save(output.as_mut(), &out_path) {
            self.status(format!("Failed to save output: {e}"));
            self.error(e.to_string());
            return RunOutcome::Failed;
        }

        let elapsed = started.elapsed().as_secs_f64();
        let throughput = if elapsed > 0.0 {
            total_processed as f64 / elapsed
        } else {
            0.0
        };
        self.state.update_control("processing.last_elapsed", elapsed);
        self.state
            .update_control("processing.last_throughput", throughput);

        self.progress(100);
        if canceled {
            self.bus.emit_from(
                "engine",
                "processing.canceled",
                Payload::new().with("path", out_path.display().to_string()),
            );
            return RunOutcome::Canceled(Some(out_path));
        }

        self.status(format!(
            "Done. Rows: {total_processed}. Wrote: {}",
            out_path.display()
        ));
        self.bus.emit_from(
            "engine",
            "processing.complete",
            Payload::new()
                .with("path", out_path.display().to_string())
                .with("elapsed", elapsed)
                .with("throughput", throughput),
        );
        RunOutcome::Completed(out_path)
    }

    fn open_input(
        &self,
        path: &Path,
        sheet: Option<&str>,
        csv_delimiter: &str,
        skip_rows: &[usize],
    ) -> Result<Box<dyn TableHandler>, reshape_io::IoError> {
        if !path.exists() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no such file: {}", path.display()),
            )
            .into());
        }
        let mut handler = self.factory.create(path)?;
        if let Some(d) = csv_delimiter.chars().next() {
            handler.set_delimiter(d);
        }
        if let Some(sheet) = sheet {
            // Back-ends without sheets simply ignore the request.
            let _ = handler.set_sheet(sheet);
        }
        if !skip_rows.is_empty() && handler.set_rows_to_skip(skip_rows.to_vec()).is_err() {
            // List skipping unsupported: a contiguous zero-based prefix is
            // equivalent to a header count, anything else is dropped.
            if is_contiguous_prefix(skip_rows) {
                let mut unique = skip_rows.to_vec();
                unique.sort_unstable();
                unique.dedup();
                handler.set_header_rows_to_skip(unique.len());
            }
        }
        Ok(handler)
    }

    /// Returns `false` when strict validation failed (terminal event emitted).
    fn enforce_strictness(
        &self,
        mapping: &[Slot],
        headers: &[String],
        strict: bool,
        strict_per_slot: bool,
    ) -> bool {
        let mut missing_all: Vec<String> = collect_all_sources(mapping)
            .into_iter()
            .filter(|s| !headers.contains(s))
            .collect();
        missing_all.sort();

        let missing_per_slot: Vec<(usize, Vec<String>)> = mapping
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| {
                let mut missing: Vec<String> = slot
                    .sources
                    .iter()
                    .filter(|s| !s.is_empty() && !headers.contains(s))
                    .cloned()
                    .collect();
                missing.sort();
                (!missing.is_empty()).then_some((i, missing))
            })
            .collect();

        if strict_per_slot && !missing_per_slot.is_empty() {
            self.status(format!(
                "Strict per-slot mode: mapping slot(s) missing columns: {missing_per_slot:?}"
            ));
            self.error("Missing required columns (per-slot strict)");
            return false;
        }
        if strict && !missing_all.is_empty() {
            self.status(format!("Strict mode: missing columns: {missing_all:?}"));
            self.error("Missing required columns");
            return false;
        }
        if !missing_all.is_empty() {
            self.status(format!(
                "Warning: missing columns will be empty: {missing_all:?}"
            ));
        }
        true
    }

    /// Downgrade an unusable dedupe config to a warning instead of failing
    /// the run.
    fn validated_dedupe(
        &self,
        dedupe: Option<&DedupeConfig>,
        headers: Option<&[String]>,
    ) -> Option<DedupeConfig> {
        let config = dedupe?;
        if !config.enabled {
            return None;
        }
        if config.key.trim().is_empty() {
            self.status("Dedupe disabled: no key column configured.");
            return None;
        }
        if let Some(headers) = headers
            && !headers.iter().any(|h| *h == config.key)
        {
            self.status(format!(
                "Dedupe key {:?} not found in input columns; deduplication disabled.",
                config.key
            ));
            return None;
        }
        Some(config.clone())
    }

    fn save(
        &self,
        output: &mut dyn TableHandler,
        out_path: &Path,
    ) -> Result<(), reshape_io::IoError> {
        if let Some(parent) = out_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        output.save_as(out_path)
    }
}

fn append_mapped(
    output: &mut dyn TableHandler,
    mapping: &[Slot],
    chunk: &Frame,
    any_data: &mut bool,
) {
    let mapped = apply_mapping(chunk, mapping);
    if mapped.column_count() == 0 {
        return;
    }
    *any_data = true;
    if let Err(e) = output.append_frame(&mapped) {
        tracing::warn!(error = %e, "could not buffer mapped chunk");
    }
}

/// Cheap prepass row count; 0 means unknown.
fn estimate_total_rows(input: &mut dyn TableHandler, chunksize: usize) -> usize {
    let Ok(chunks) = input.iter_load(chunksize) else {
        return 0;
    };
    let mut total = 0usize;
    for chunk in chunks {
        match chunk {
            Ok(frame) => total += frame.len(),
            Err(_) => return 0,
        }
    }
    total
}

/// Coarse progress in `[1, 99]`; the terminal 100 is emitted only around a
/// save.
fn progress_value(processed: usize, total_rows: usize, chunk_size: usize) -> i64 {
    if total_rows > 0 {
        let pct = (processed as f64 * 95.0 / total_rows as f64).max(1.0) + 5.0;
        pct.min(99.0) as i64
    } else {
        (5 + processed / chunk_size.max(1)).min(99) as i64
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Wire a processor to `processing.start` / `processing.cancel` on `bus`.
///
/// The start subscriber reads `processing.current` from state, spawns one
/// background worker and returns immediately; at most one run is active per
/// processor at a time.
pub fn install_engine_listener(
    bus: Arc<EventBus>,
    state: Arc<State>,
    factory: Arc<HandlerFactory>,
) -> Arc<Processor> {
    let processor = Arc::new(Processor::new(Arc::clone(&bus), state, factory));
    let busy = Arc::new(AtomicBool::new(false));

    {
        let processor = Arc::clone(&processor);
        let busy = Arc::clone(&busy);
        let start_bus = Arc::clone(&bus);
        bus.on("processing.start", move |_| {
            if busy.swap(true, Ordering::SeqCst) {
                start_bus.emit_from(
                    "engine",
                    "status.update",
                    Payload::new().with("msg", "A processing run is already active."),
                );
                return;
            }
            let processor = Arc::clone(&processor);
            let busy_thread = Arc::clone(&busy);
            let spawned = std::thread::Builder::new()
                .name("reshape-processing".to_string())
                .spawn(move || {
                    let ctx = processor.state.current_context().unwrap_or_default();
                    processor.run(&ctx);
                    busy_thread.store(false, Ordering::SeqCst);
                });
            if let Err(e) = spawned {
                busy.store(false, Ordering::SeqCst);
                tracing::error!(error = %e, "could not spawn processing worker");
            }
        })
        .expect("exact topic subscription cannot fail");
    }
    {
        let token = processor.cancel_token();
        bus.on("processing.cancel", move |_| token.set())
            .expect("exact topic subscription cannot fail");
    }
    processor
}

static LISTENER: Lazy<Mutex<Option<Arc<Processor>>>> = Lazy::new(|| Mutex::new(None));

/// Install the listener once on the global bus, state and factory.
pub fn ensure_engine_listener() -> Arc<Processor> {
    let mut guard = LISTENER.lock();
    if let Some(processor) = guard.as_ref() {
        return Arc::clone(processor);
    }
    let processor =
        install_engine_listener(reshape_events::global(), default_state(), default_factory());
    *guard = Some(Arc::clone(&processor));
    processor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_with_known_total_is_clamped_to_99() {
        assert_eq!(progress_value(0, 100, 10), 6);
        assert_eq!(progress_value(1, 1_000_000, 10), 6);
        assert_eq!(progress_value(50, 100, 10), 52);
        assert_eq!(progress_value(100, 100, 10), 99);
        assert_eq!(progress_value(1_000, 100, 10), 99);
    }

    #[test]
    fn progress_with_unknown_total_grows_monotonically() {
        let mut last = 0;
        for processed in (0..100_000).step_by(5_000) {
            let value = progress_value(processed, 0, 1_000);
            assert!(value >= last);
            assert!(value <= 99);
            last = value;
        }
    }

    #[test]
    fn cancel_token_round_trip() {
        let token = CancelToken::new();
        assert!(!token.is_set());
        token.set();
        assert!(token.is_set());
        let clone = token.clone();
        assert!(clone.is_set());
        clone.clear();
        assert!(!token.is_set());
    }
}
