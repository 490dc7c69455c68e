//! Per-session worker task.
//!
//! Owns all session-local state: the utterance buffer, the sequence
//! counter, the current language pair, and the delivery ordering gate.
//! Inbound commands arrive on one channel, so frames and language updates
//! are applied in submission order. Each completed utterance span is run
//! as an independent task, gated by the shared concurrency limiter.

use crate::buffer::chunker::UtteranceBuffer;
use crate::buffer::frame::{AudioFrame, AudioSpan};
use crate::limiter::ConcurrencyLimiter;
use crate::pipeline::orchestrator::PipelineOrchestrator;
use crate::pipeline::reorder::DeliveryGate;
use crate::pipeline::types::{Delivery, SessionSnapshot, Utterance};
use crate::quality::{QualityAggregator, QualitySample};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Inbound session operations, applied in order.
pub(crate) enum SessionCommand {
    Frame(AudioFrame),
    UpdateLanguages { source: String, target: String },
    End,
}

/// Everything a worker needs, assembled by the manager.
pub(crate) struct WorkerContext {
    pub session_id: String,
    pub snapshot: SessionSnapshot,
    pub buffer: UtteranceBuffer,
    pub reorder_window: u64,
    pub idle_timeout: Duration,
    pub orchestrator: Arc<PipelineOrchestrator>,
    pub limiter: Arc<ConcurrencyLimiter>,
    pub quality: Arc<QualityAggregator>,
    pub commands: mpsc::Receiver<SessionCommand>,
    pub deliveries: mpsc::Sender<Delivery>,
}

pub(crate) struct SessionWorker {
    session_id: String,
    snapshot: SessionSnapshot,
    /// Language swap staged until the next utterance boundary.
    pending_languages: Option<(String, String)>,
    buffer: UtteranceBuffer,
    next_sequence: u64,
    gate: DeliveryGate,
    idle_timeout: Duration,
    idle_deadline: Instant,
    orchestrator: Arc<PipelineOrchestrator>,
    limiter: Arc<ConcurrencyLimiter>,
    quality: Arc<QualityAggregator>,
    commands: mpsc::Receiver<SessionCommand>,
    deliveries: mpsc::Sender<Delivery>,
    results_tx: mpsc::Sender<Delivery>,
    results_rx: mpsc::Receiver<Delivery>,
    tasks: JoinSet<()>,
}

impl SessionWorker {
    pub(crate) fn new(context: WorkerContext) -> Self {
        let (results_tx, results_rx) = mpsc::channel(64);
        Self {
            session_id: context.session_id,
            snapshot: context.snapshot,
            pending_languages: None,
            buffer: context.buffer,
            next_sequence: 0,
            gate: DeliveryGate::new(context.reorder_window),
            idle_timeout: context.idle_timeout,
            idle_deadline: Instant::now() + context.idle_timeout,
            orchestrator: context.orchestrator,
            limiter: context.limiter,
            quality: context.quality,
            commands: context.commands,
            deliveries: context.deliveries,
            results_tx,
            results_rx,
            tasks: JoinSet::new(),
        }
    }

    pub(crate) async fn run(mut self) {
        info!(
            session_id = %self.session_id,
            source = %self.snapshot.source_language,
            target = %self.snapshot.target_language,
            transcriber_model = %self.snapshot.models.transcriber,
            translator_model = %self.snapshot.models.translator,
            synthesizer_model = %self.snapshot.models.synthesizer,
            "session started"
        );

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(SessionCommand::Frame(frame)) => self.handle_frame(frame),
                    Some(SessionCommand::UpdateLanguages { source, target }) => {
                        self.update_languages(source, target);
                    }
                    Some(SessionCommand::End) | None => {
                        info!(session_id = %self.session_id, "session ended");
                        break;
                    }
                },
                Some(result) = self.results_rx.recv() => self.handle_result(result).await,
                Some(_) = self.tasks.join_next(), if !self.tasks.is_empty() => {}
                _ = tokio::time::sleep_until(self.idle_deadline) => {
                    info!(session_id = %self.session_id, "session idle timeout");
                    break;
                }
            }
        }

        // Cancel in-flight stage calls; their slots return to the pool as
        // the tasks drop. Partially buffered speech is discarded.
        self.tasks.abort_all();
        self.quality.forget_session(&self.session_id);
    }

    fn handle_frame(&mut self, frame: AudioFrame) {
        self.idle_deadline = Instant::now() + self.idle_timeout;
        if let Some(span) = self.buffer.push(frame) {
            self.launch(span);
            self.apply_pending_languages();
        }
    }

    fn launch(&mut self, span: AudioSpan) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;

        let utterance = Utterance::new(self.session_id.clone(), sequence, span);
        let snapshot = self.snapshot.clone();
        let orchestrator = Arc::clone(&self.orchestrator);
        let limiter = Arc::clone(&self.limiter);
        let results = self.results_tx.clone();

        debug!(session_id = %self.session_id, sequence, "utterance launched");
        self.tasks.spawn(async move {
            let delivery = match limiter.acquire().await {
                Ok(_slot) => orchestrator.run(utterance, &snapshot).await,
                Err(error) => {
                    warn!(
                        session_id = %utterance.session_id,
                        sequence,
                        %error,
                        "utterance rejected for capacity, delivering gap marker"
                    );
                    Delivery::dropped(
                        utterance.session_id.clone(),
                        sequence,
                        utterance.created_at.elapsed().as_millis() as u64,
                    )
                }
            };
            if results.send(delivery).await.is_err() {
                debug!(sequence, "worker gone before result handoff");
            }
        });
    }

    /// Stages a language swap; it takes effect at the next utterance
    /// boundary, or immediately if nothing is buffering.
    fn update_languages(&mut self, source: String, target: String) {
        self.pending_languages = Some((source, target));
        if self.buffer.is_idle() {
            self.apply_pending_languages();
        }
    }

    fn apply_pending_languages(&mut self) {
        if let Some((source, target)) = self.pending_languages.take() {
            info!(
                session_id = %self.session_id,
                %source,
                %target,
                "language pair updated"
            );
            self.snapshot.source_language = source;
            self.snapshot.target_language = target;
        }
    }

    async fn handle_result(&mut self, result: Delivery) {
        for delivery in self.gate.submit(result) {
            self.quality.record(&QualitySample::from_delivery(&delivery));
            if self.deliveries.send(delivery).await.is_err() {
                debug!(session_id = %self.session_id, "delivery receiver dropped");
            }
        }
    }
}
