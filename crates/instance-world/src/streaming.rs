// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Stream-in admission, arrival fix-up and teardown flush.
use tracing::{debug, warn};

use crate::graph::GraphHandle;
use crate::host::Host;
use crate::ident::InstanceId;
use crate::resource::{Level, StreamState, StreamingLevel};
use crate::rewrite::{ReferenceRewriter, RewriteStats};
use crate::source::resolve_template;

/// Hook attached to a streaming slot by the duplicator. Localizes the slot's
/// content for its instance when it arrives.
#[derive(Clone, Debug)]
pub struct StreamFixup {
    rewriter: ReferenceRewriter,
    instance: InstanceId,
}

impl StreamFixup {
    /// Creates a hook rewriting into the namespace of `instance`.
    #[must_use]
    pub fn new(rewriter: ReferenceRewriter, instance: InstanceId) -> Self {
        Self { rewriter, instance }
    }

    /// Instance the hook rewrites for.
    #[must_use]
    pub fn instance(&self) -> InstanceId {
        self.instance
    }

    /// Rewrites freshly loaded content.
    pub fn apply(&self, level: &mut Level) -> RewriteStats {
        self.rewriter.rewrite(level, self.instance)
    }
}

/// Outcome of [`flush_streaming`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Pending slots that were loaded.
    pub loaded: usize,
    /// Pending slots that were cancelled.
    pub cancelled: usize,
    /// Loaded slots no longer requested loaded and visible, unloaded by a
    /// forced flush.
    pub unloaded: usize,
}

/// Loads one slot into its namespaced storage. Returns `true` on success.
fn load_slot(graph_name: &str, slot: &mut StreamingLevel, host: &mut Host, running: bool) -> bool {
    let target = slot.package.clone();
    let source = slot.load_package().to_owned();
    if !host.packages().contains(&target) {
        if let Err(err) = host.packages_mut().create(target.clone()) {
            warn!(graph = graph_name, %err, "stream-in storage could not be created");
            slot.state = StreamState::Failed;
            return false;
        }
    }
    match resolve_template(host.templates(), &source) {
        Ok(content) => {
            let mut level = content.root;
            let stats = slot
                .fixup
                .as_ref()
                .map(|fixup| fixup.apply(&mut level))
                .unwrap_or_default();
            if running {
                level.begin_running();
            }
            debug!(
                graph = graph_name,
                package = %target,
                visited = stats.visited,
                rewritten = stats.rewritten,
                "streamed in"
            );
            slot.loaded = Some(level);
            slot.state = StreamState::Shown;
            true
        }
        Err(err) => {
            host.packages_mut().purge(&target);
            warn!(graph = graph_name, package = %target, %err, "stream-in failed");
            slot.state = StreamState::Failed;
            false
        }
    }
}

/// Admits every pending stream-in of `graph`. Returns how many loaded.
///
/// Nothing is admitted while streaming is frozen or the graph is tearing
/// down.
pub fn process_streaming(graph: &GraphHandle, host: &mut Host) -> usize {
    let mut g = graph.borrow_mut();
    if g.is_streaming_frozen() || g.is_tearing_down() {
        return 0;
    }
    let name = g.name().to_owned();
    let running = g.has_begun_running();
    g.content_mut()
        .streaming
        .iter_mut()
        .filter(|slot| slot.is_pending())
        .map(|slot| load_slot(&name, slot, host, running))
        .filter(|loaded| *loaded)
        .count()
}

/// Resolves every pending stream-in of `graph` right away.
///
/// Slots are cancelled when the graph forces a streaming unload, loaded
/// otherwise. Admission flags are ignored. A forced unload also drops every
/// loaded level that is no longer requested loaded or visible.
pub fn flush_streaming(graph: &GraphHandle, host: &mut Host) -> FlushReport {
    let mut g = graph.borrow_mut();
    let name = g.name().to_owned();
    let running = g.has_begun_running();
    let cancel = g.force_unload_streaming();
    let mut report = FlushReport::default();
    for slot in g.content_mut().streaming.iter_mut().filter(|s| s.is_pending()) {
        if cancel {
            slot.state = StreamState::Cancelled;
            slot.should_be_loaded = false;
            report.cancelled += 1;
        } else if load_slot(&name, slot, host, running) {
            report.loaded += 1;
        }
    }
    if cancel {
        for slot in &mut g.content_mut().streaming {
            if slot.should_be_loaded && slot.should_be_visible {
                continue;
            }
            if let Some(mut level) = slot.loaded.take() {
                level.end_running();
                slot.state = StreamState::Unloaded;
                report.unloaded += 1;
            }
        }
    }
    if report != FlushReport::default() {
        debug!(
            graph = %name,
            loaded = report.loaded,
            cancelled = report.cancelled,
            unloaded = report.unloaded,
            "flushed streaming"
        );
    }
    report
}
