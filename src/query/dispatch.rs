use super::cache::{DetailCache, Lookup};
use super::WorldBankApi;
use crate::error::QueryFailure;
use crate::model::{CountryDetail, IndicatorValue};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Raw completion sent back by a query task
enum Completion {
    Indicator {
        generation: u64,
        indicator: String,
        year: u16,
        result: Result<Vec<IndicatorValue>, QueryFailure>,
    },
    Country {
        request: u64,
        code: String,
        result: Result<CountryDetail, QueryFailure>,
    },
}

/// A completed query that is still relevant to the view.
#[derive(Debug)]
pub enum QueryUpdate {
    Indicator {
        indicator: String,
        year: u16,
        values: Vec<IndicatorValue>,
    },
    IndicatorFailed {
        indicator: String,
        year: u16,
        error: QueryFailure,
    },
    Country {
        code: String,
        detail: CountryDetail,
    },
    CountryFailed {
        code: String,
        error: QueryFailure,
    },
}

/// Runs remote queries on a tokio runtime and hands completions back to the
/// UI thread. The newest indicator request supersedes older ones; country
/// details are fetched at most once per code at a time and cached forever.
pub struct QueryDispatcher<A: WorldBankApi> {
    api: Arc<A>,
    runtime: Handle,
    timeout: Duration,
    tx: UnboundedSender<Completion>,
    rx: UnboundedReceiver<Completion>,
    generation: u64,
    indicator_task: Option<JoinHandle<()>>,
    details: DetailCache,
    /// In-flight detail fetches by code, tagged with their request number
    detail_tasks: HashMap<String, (u64, JoinHandle<()>)>,
    next_request: u64,
}

impl<A: WorldBankApi> QueryDispatcher<A> {
    pub fn new(api: Arc<A>, runtime: Handle, timeout: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            api,
            runtime,
            timeout,
            tx,
            rx,
            generation: 0,
            indicator_task: None,
            details: DetailCache::new(),
            detail_tasks: HashMap::new(),
            next_request: 0,
        }
    }

    /// Start fetching `indicator` for `year`, aborting any older request.
    pub fn request_indicator(&mut self, indicator: &str, year: u16) {
        if let Some(task) = self.indicator_task.take() {
            task.abort();
        }
        self.generation += 1;
        let generation = self.generation;
        debug!(indicator, year, generation, "indicator query");

        let api = Arc::clone(&self.api);
        let tx = self.tx.clone();
        let timeout = self.timeout;
        let indicator = indicator.to_string();

        self.indicator_task = Some(self.runtime.spawn(async move {
            let result = with_timeout(timeout, api.indicator(&indicator, year)).await;
            let _ = tx.send(Completion::Indicator {
                generation,
                indicator,
                year,
                result,
            });
        }));
    }

    /// Cached detail, or start (at most one) fetch for it.
    pub fn request_country(&mut self, code: &str) -> Lookup {
        let lookup = self.details.lookup(code);
        if lookup == Lookup::Miss {
            self.next_request += 1;
            let request = self.next_request;
            debug!(code, request, "country query");
            let api = Arc::clone(&self.api);
            let tx = self.tx.clone();
            let timeout = self.timeout;
            let code_owned = code.to_string();

            let task = self.runtime.spawn(async move {
                let result = with_timeout(timeout, api.country(&code_owned)).await;
                let _ = tx.send(Completion::Country {
                    request,
                    code: code_owned,
                    result,
                });
            });
            self.detail_tasks.insert(code.to_string(), (request, task));
        }
        lookup
    }

    /// Abort an in-flight detail fetch; the next request starts over.
    pub fn cancel_country(&mut self, code: &str) {
        if let Some((_, task)) = self.detail_tasks.remove(code) {
            task.abort();
            self.details.abandon(code);
            debug!(code, "country query cancelled");
        }
    }

    /// Drain finished queries without blocking.
    pub fn poll(&mut self) -> Vec<QueryUpdate> {
        let mut updates = Vec::new();
        while let Ok(completion) = self.rx.try_recv() {
            if let Some(update) = self.accept(completion) {
                updates.push(update);
            }
        }
        updates
    }

    /// Wait for the next relevant completion.
    pub async fn next_update(&mut self) -> Option<QueryUpdate> {
        while let Some(completion) = self.rx.recv().await {
            if let Some(update) = self.accept(completion) {
                return Some(update);
            }
        }
        None
    }

    fn accept(&mut self, completion: Completion) -> Option<QueryUpdate> {
        match completion {
            Completion::Indicator {
                generation,
                indicator,
                year,
                result,
            } => {
                if generation != self.generation {
                    debug!(indicator = %indicator, year, generation, "discarding superseded indicator response");
                    return None;
                }
                self.indicator_task = None;
                Some(match result {
                    Ok(values) => QueryUpdate::Indicator {
                        indicator,
                        year,
                        values,
                    },
                    Err(error) => {
                        warn!(indicator = %indicator, year, %error, "indicator query failed");
                        QueryUpdate::IndicatorFailed {
                            indicator,
                            year,
                            error,
                        }
                    }
                })
            }
            Completion::Country {
                request,
                code,
                result,
            } => {
                // A cancelled fetch may have sent before it was aborted
                if !matches!(self.detail_tasks.get(&code), Some((current, _)) if *current == request) {
                    debug!(code = %code, request, "discarding cancelled country response");
                    return None;
                }
                self.detail_tasks.remove(&code);
                Some(match result {
                    Ok(detail) => {
                        let detail = self.details.fulfill(&code, detail).clone();
                        QueryUpdate::Country { code, detail }
                    }
                    Err(error) => {
                        warn!(code = %code, %error, "country query failed");
                        self.details.abandon(&code);
                        QueryUpdate::CountryFailed { code, error }
                    }
                })
            }
        }
    }
}

async fn with_timeout<T>(
    limit: Duration,
    fut: impl Future<Output = Result<T, QueryFailure>>,
) -> Result<T, QueryFailure> {
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(QueryFailure::Timeout(limit)),
    }
}
