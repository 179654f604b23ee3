// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Clash detection on a background worker thread.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use serde::{Deserialize, Serialize};

use crate::config::DetectorOptions;
use crate::detector::ClashDetector;
use crate::error::{Error, Result};
use crate::model::GeometrySource;
use crate::progress::{percent, ProgressSink};
use crate::report::ClashReport;
use crate::results::RunState;
use crate::rules::ClashDetectorRules;

/// What to check: two model ids and a JSON rules payload. Equal ids run a
/// self-check.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClashRequest {
    pub model1: u64,
    pub model2: u64,
    pub rules: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JobState {
    Started,
    Running,
    Finished,
    Cancelled,
    Errored,
}

/// State shared between the job handle and its worker.
#[derive(Debug)]
struct JobShared {
    /// Percent done, -1 until the first report.
    progress: AtomicI32,
    cancelled: AtomicBool,
    state: Mutex<JobState>,
}

impl JobShared {
    fn set_state(&self, state: JobState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    fn state(&self) -> JobState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ProgressSink for JobShared {
    fn report_progress(&self, current: u64, total: u64) {
        self.progress
            .store(i32::from(percent(current, total)), Ordering::Relaxed);
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// Handle to a running clash detection.
#[derive(Debug)]
pub struct ClashJob {
    shared: Arc<JobShared>,
    handle: JoinHandle<Result<ClashReport>>,
}

impl ClashJob {
    /// Loads both models from `source` and runs the detection on a new thread.
    pub fn spawn<S>(source: Arc<S>, request: ClashRequest, options: DetectorOptions) -> Result<Self>
    where
        S: GeometrySource + ?Sized + 'static,
    {
        let shared = Arc::new(JobShared {
            progress: AtomicI32::new(-1),
            cancelled: AtomicBool::new(false),
            state: Mutex::new(JobState::Started),
        });

        let worker = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name(format!("clash-{}-{}", request.model1, request.model2))
            .spawn(move || {
                worker.set_state(JobState::Running);
                let outcome = catch_unwind(AssertUnwindSafe(|| {
                    run_job(source.as_ref(), &request, &options, &worker)
                }))
                .unwrap_or(Err(Error::JobPanicked));

                match &outcome {
                    Ok(report) if report.metrics.state == RunState::Cancelled => {
                        worker.set_state(JobState::Cancelled)
                    }
                    Ok(_) => worker.set_state(JobState::Finished),
                    Err(e) => {
                        tracing::error!(
                            model1 = request.model1,
                            model2 = request.model2,
                            error = %e,
                            "Clash job failed"
                        );
                        worker.set_state(JobState::Errored);
                    }
                }
                outcome
            })?;

        Ok(Self { shared, handle })
    }

    #[inline]
    pub fn state(&self) -> JobState {
        self.shared.state()
    }

    /// Percent done, or -1 before the first report.
    #[inline]
    pub fn progress(&self) -> i32 {
        self.shared.progress.load(Ordering::Relaxed)
    }

    /// Asks the worker to stop at its next progress poll.
    pub fn cancel(&self) {
        self.shared.cancelled.store(true, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits for the worker and returns its report.
    pub fn join(self) -> Result<ClashReport> {
        self.handle.join().map_err(|_| {
            self.shared.set_state(JobState::Errored);
            Error::JobPanicked
        })?
    }
}

fn run_job(
    source: &(impl GeometrySource + ?Sized),
    request: &ClashRequest,
    options: &DetectorOptions,
    sink: &JobShared,
) -> Result<ClashReport> {
    let rules = ClashDetectorRules::from_json(&request.rules)?;
    let model1 = source.load_model(request.model1)?;
    let model2 = if request.model2 == request.model1 {
        None
    } else {
        Some(source.load_model(request.model2)?)
    };

    tracing::info!(
        model1 = request.model1,
        model2 = request.model2,
        rules = rules.name.as_deref().unwrap_or(""),
        "Clash job loaded models"
    );

    let detector = match &model2 {
        Some(model2) => ClashDetector::new(&model1, model2, rules),
        None => ClashDetector::self_check(&model1, rules),
    };
    let results = detector.with_options(options.clone()).find_clashes(sink)?;
    Ok(results.to_report(options.report_weld_epsilon))
}
