//! Session lifecycle and frame routing.

use crate::buffer::chunker::{UtteranceBuffer, UtteranceBufferConfig};
use crate::buffer::frame::AudioFrame;
use crate::buffer::vad::{EnergyVad, VoiceActivity};
use crate::config::{Config, EngineBinding};
use crate::defaults::is_supported_language;
use crate::engine::traits::EngineSet;
use crate::error::{LingolinkError, Result};
use crate::limiter::ConcurrencyLimiter;
use crate::monitor::MonitorSnapshot;
use crate::pipeline::orchestrator::{OrchestratorConfig, PipelineOrchestrator};
use crate::pipeline::types::{Delivery, ModelLabels, SessionSnapshot};
use crate::quality::QualityAggregator;
use crate::session::worker::{SessionCommand, SessionWorker, WorkerContext};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Routing entry for one live session.
struct SessionHandle {
    commands: mpsc::Sender<SessionCommand>,
}

/// Owns all sessions and routes inbound operations to their workers.
///
/// One worker task per session holds the session-local state; the manager
/// itself only keeps the command channels, the shared limiter, and the
/// shared quality aggregator, so no cross-session locking happens beyond
/// the limiter's slot pool.
pub struct SessionManager {
    config: Config,
    engines: EngineSet,
    vad: Arc<dyn VoiceActivity>,
    limiter: Arc<ConcurrencyLimiter>,
    quality: Arc<QualityAggregator>,
    orchestrator: Arc<PipelineOrchestrator>,
    sessions: Arc<Mutex<HashMap<String, SessionHandle>>>,
}

impl SessionManager {
    /// Builds a manager with engines selected by the configured binding.
    ///
    /// Fails with a configuration error when the binding requires engines
    /// injected by the embedding application.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        match config.engines.binding {
            EngineBinding::Deterministic => {
                let engines = EngineSet::deterministic();
                Ok(Self::assemble(config, engines))
            }
            EngineBinding::External => Err(LingolinkError::ConfigInvalidValue {
                key: "engines.binding".to_string(),
                message: "external binding requires with_engines".to_string(),
            }),
        }
    }

    /// Builds a manager around injected engines.
    pub fn with_engines(config: Config, engines: EngineSet) -> Result<Self> {
        config.validate()?;
        Ok(Self::assemble(config, engines))
    }

    fn assemble(config: Config, engines: EngineSet) -> Self {
        let orchestrator = Arc::new(PipelineOrchestrator::new(
            engines.clone(),
            OrchestratorConfig::from_config(&config),
        ));
        Self {
            vad: Arc::new(EnergyVad::new(config.buffer.vad_threshold)),
            limiter: Arc::new(ConcurrencyLimiter::new(&config.limiter)),
            quality: Arc::new(QualityAggregator::new(&config.quality)),
            orchestrator,
            sessions: Arc::new(Mutex::new(HashMap::new())),
            engines,
            config,
        }
    }

    /// Creates a session and returns the receiver for its deliveries.
    ///
    /// Fails fast on an unsupported language pair or a duplicate id.
    pub fn create_session(
        &self,
        session_id: &str,
        source_language: &str,
        target_language: &str,
        voice_profile: &str,
    ) -> Result<mpsc::Receiver<Delivery>> {
        validate_language_pair(source_language, target_language)?;

        let mut sessions = lock(&self.sessions);
        if sessions.contains_key(session_id) {
            return Err(LingolinkError::SessionAlreadyExists {
                session_id: session_id.to_string(),
            });
        }

        let (command_tx, command_rx) = mpsc::channel(256);
        let (delivery_tx, delivery_rx) = mpsc::channel(64);

        let worker = SessionWorker::new(WorkerContext {
            session_id: session_id.to_string(),
            snapshot: SessionSnapshot {
                source_language: source_language.to_string(),
                target_language: target_language.to_string(),
                voice_profile: voice_profile.to_string(),
                models: ModelLabels {
                    transcriber: self.config.engines.transcriber_model.clone(),
                    translator: self.config.engines.translator_model.clone(),
                    synthesizer: self.config.engines.synthesizer_model.clone(),
                },
            },
            buffer: UtteranceBuffer::new(
                UtteranceBufferConfig {
                    endpoint_silence_ms: self.config.buffer.endpoint_silence_ms,
                    max_utterance_ms: self.config.buffer.max_utterance_ms,
                    sample_rate: self.config.buffer.sample_rate,
                },
                Arc::clone(&self.vad),
            ),
            reorder_window: self.config.pipeline.reorder_window,
            idle_timeout: Duration::from_secs(self.config.session.idle_timeout_secs),
            orchestrator: Arc::clone(&self.orchestrator),
            limiter: Arc::clone(&self.limiter),
            quality: Arc::clone(&self.quality),
            commands: command_rx,
            deliveries: delivery_tx,
        });

        // The worker unregisters itself when it exits on its own, e.g. on
        // idle timeout.
        let registry = Arc::clone(&self.sessions);
        let id = session_id.to_string();
        let own_sender = command_tx.clone();
        tokio::spawn(async move {
            worker.run().await;
            let mut sessions = lock(&registry);
            if sessions
                .get(&id)
                .is_some_and(|handle| handle.commands.same_channel(&own_sender))
            {
                sessions.remove(&id);
            }
        });

        sessions.insert(
            session_id.to_string(),
            SessionHandle {
                commands: command_tx,
            },
        );
        Ok(delivery_rx)
    }

    /// Routes one audio frame to its session.
    ///
    /// Frames for a session that already ended are discarded silently;
    /// frames for a session that never existed are an error.
    pub async fn submit_audio_frame(
        &self,
        session_id: &str,
        frame_bytes: Vec<u8>,
        timestamp_ms: u64,
    ) -> Result<()> {
        let commands = self.commands_for(session_id)?;
        let frame = AudioFrame::new(frame_bytes, timestamp_ms);
        if commands.send(SessionCommand::Frame(frame)).await.is_err() {
            // Worker already gone (idle timeout raced the frame).
            debug!(session_id, "frame for ended session discarded");
            lock(&self.sessions).remove(session_id);
        }
        Ok(())
    }

    /// Swaps the session's language pair, effective at the next utterance
    /// boundary. Never interrupts an utterance already in flight.
    pub async fn update_session_languages(
        &self,
        session_id: &str,
        source_language: &str,
        target_language: &str,
    ) -> Result<()> {
        validate_language_pair(source_language, target_language)?;
        let commands = self.commands_for(session_id)?;
        commands
            .send(SessionCommand::UpdateLanguages {
                source: source_language.to_string(),
                target: target_language.to_string(),
            })
            .await
            .map_err(|_| LingolinkError::SessionNotFound {
                session_id: session_id.to_string(),
            })
    }

    /// Ends a session: cancels its in-flight work and discards any
    /// partially buffered speech.
    pub async fn end_session(&self, session_id: &str) -> Result<()> {
        let handle = lock(&self.sessions).remove(session_id).ok_or_else(|| {
            LingolinkError::SessionNotFound {
                session_id: session_id.to_string(),
            }
        })?;
        // A send failure means the worker already exited; ending is done
        // either way.
        handle.commands.send(SessionCommand::End).await.ok();
        info!(session_id, "session end requested");
        Ok(())
    }

    /// Number of currently registered sessions.
    pub fn active_sessions(&self) -> usize {
        lock(&self.sessions).len()
    }

    /// Observability snapshot: rolling quality stats plus limiter occupancy.
    pub fn monitor_snapshot(&self) -> MonitorSnapshot {
        MonitorSnapshot::capture(&self.quality, &self.limiter)
    }

    /// Per-session rolling quality stats, if the session has any samples.
    pub fn session_stats(&self, session_id: &str) -> Option<crate::quality::WindowStats> {
        self.quality.session_stats(session_id)
    }

    /// The engines this manager runs against.
    pub fn engines(&self) -> &EngineSet {
        &self.engines
    }

    fn commands_for(&self, session_id: &str) -> Result<mpsc::Sender<SessionCommand>> {
        lock(&self.sessions)
            .get(session_id)
            .map(|handle| handle.commands.clone())
            .ok_or_else(|| LingolinkError::SessionNotFound {
                session_id: session_id.to_string(),
            })
    }
}

fn validate_language_pair(source: &str, target: &str) -> Result<()> {
    if !is_supported_language(source) || !is_supported_language(target) {
        return Err(LingolinkError::UnsupportedLanguagePair {
            source_language: source.to_string(),
            target_language: target.to_string(),
        });
    }
    Ok(())
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
