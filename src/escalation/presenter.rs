use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

use crate::notifications::ack::AckHandle;
use crate::notifications::channel::ChannelError;
use crate::notifications::types::{Category, NotificationId, NotificationRequest};
use crate::platform::ports::{AudioPlayer, ModalSpec, ModalSurface, TitleBar};

#[derive(Debug, Clone)]
pub struct EscalationConfig {
    pub audio_plays: u32,
    pub audio_spacing: Duration,
    pub title_flash_cycles: u32,
    pub title_flash_interval: Duration,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            audio_plays: 3,
            audio_spacing: Duration::from_secs(2),
            title_flash_cycles: 10,
            title_flash_interval: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AudioAssets {
    pub booking: PathBuf,
    pub message: PathBuf,
    pub alert: PathBuf,
}

impl Default for AudioAssets {
    fn default() -> Self {
        Self {
            booking: PathBuf::from("sounds/booking.mp3"),
            message: PathBuf::from("sounds/message.mp3"),
            alert: PathBuf::from("sounds/alert.mp3"),
        }
    }
}

impl AudioAssets {
    pub fn for_category(&self, category: Category) -> &Path {
        match category {
            Category::Booking => &self.booking,
            Category::Message => &self.message,
            Category::Alert => &self.alert,
        }
    }
}

/// What one escalation decided to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscalationPlan {
    pub modal: bool,
    pub audio_plays: u32,
    pub flash_title: bool,
}

struct TitleFlash {
    generation: u64,
    baseline: String,
    token: CancellationToken,
}

#[derive(Default)]
struct FlashSlot {
    generation: u64,
    active: Option<TitleFlash>,
}

#[derive(Clone)]
pub struct EscalationPresenter {
    modal: Arc<dyn ModalSurface>,
    audio: Arc<dyn AudioPlayer>,
    title: Arc<dyn TitleBar>,
    assets: AudioAssets,
    config: EscalationConfig,
    cues: Arc<DashMap<NotificationId, CancellationToken>>,
    flash: Arc<Mutex<FlashSlot>>,
}

impl EscalationPresenter {
    pub fn new(
        modal: Arc<dyn ModalSurface>,
        audio: Arc<dyn AudioPlayer>,
        title: Arc<dyn TitleBar>,
        assets: AudioAssets,
        config: EscalationConfig,
    ) -> Self {
        Self {
            modal,
            audio,
            title,
            assets,
            config,
            cues: Arc::new(DashMap::new()),
            flash: Arc::new(Mutex::new(FlashSlot::default())),
        }
    }

    pub fn is_supported(&self) -> bool {
        self.modal.is_supported() || self.audio.is_supported()
    }

    pub fn plan(&self, request: &NotificationRequest) -> EscalationPlan {
        let repeat = request.attempt_count > 1;
        let modal = (request.category == Category::Alert || repeat) && self.modal.is_supported();
        let audio_plays = if !self.audio.is_supported() {
            0
        } else if request.category.is_high_priority() {
            self.config.audio_plays.max(1)
        } else {
            1
        };
        EscalationPlan {
            modal,
            audio_plays,
            flash_title: modal,
        }
    }

    /// Starts the cues for `request` and returns without waiting for them. A previous
    /// escalation for the same id is replaced.
    pub fn escalate(
        &self,
        request: &NotificationRequest,
        ack: AckHandle,
    ) -> Result<EscalationPlan, ChannelError> {
        let plan = self.plan(request);
        if !plan.modal && plan.audio_plays == 0 {
            return Err(ChannelError::Unsupported);
        }

        if plan.modal {
            let modal = ModalSpec {
                notification_id: request.id.clone(),
                title: request.title.clone(),
                body: request.body.clone(),
                action_label: "Acknowledge".to_string(),
            };
            self.modal.show(modal, ack)?;
        }

        let token = CancellationToken::new();
        if let Some(previous) = self.cues.insert(request.id.clone(), token.clone()) {
            previous.cancel();
        }
        if plan.audio_plays > 0 {
            self.spawn_audio(request, plan.audio_plays, token.clone());
        }
        if plan.flash_title {
            self.spawn_title_flash(request, token);
        }
        tracing::debug!(
            event = "escalation_started",
            notification_id = %request.id,
            modal = plan.modal,
            audio_plays = plan.audio_plays,
            "escalation started"
        );
        Ok(plan)
    }

    /// Stops every cue for `id`: audio, modal and a title flash it owns.
    pub fn stop(&self, id: &str) {
        if let Some((_, token)) = self.cues.remove(id) {
            token.cancel();
        }
        self.modal.dismiss(id);
    }

    pub fn stop_all(&self) {
        let ids: Vec<NotificationId> = self.cues.iter().map(|entry| entry.key().clone()).collect();
        for id in ids {
            self.stop(&id);
        }
    }

    pub fn is_escalating(&self, id: &str) -> bool {
        self.cues
            .get(id)
            .is_some_and(|token| !token.is_cancelled())
    }

    fn spawn_audio(&self, request: &NotificationRequest, plays: u32, token: CancellationToken) {
        let audio = Arc::clone(&self.audio);
        let clip = self.assets.for_category(request.category).to_path_buf();
        let spacing = self.config.audio_spacing;
        let id = request.id.clone();
        tokio::spawn(async move {
            for play in 0..plays {
                if play > 0 {
                    tokio::select! {
                        _ = token.cancelled() => return,
                        _ = tokio::time::sleep(spacing) => {}
                    }
                }
                if token.is_cancelled() {
                    return;
                }
                if let Err(err) = audio.play(&clip) {
                    tracing::warn!(
                        event = "audio_cue_failed",
                        notification_id = %id,
                        clip = %clip.display(),
                        error = %err,
                        "audio cue failed"
                    );
                }
            }
        });
    }

    fn spawn_title_flash(&self, request: &NotificationRequest, cue_token: CancellationToken) {
        // Child token: replacing this flash must not silence the request's audio.
        let token = cue_token.child_token();
        let (generation, baseline) = {
            let Ok(mut slot) = self.flash.lock() else {
                return;
            };
            let baseline = match slot.active.take() {
                Some(previous) => {
                    previous.token.cancel();
                    previous.baseline
                }
                None => self.title.current(),
            };
            slot.generation += 1;
            slot.active = Some(TitleFlash {
                generation: slot.generation,
                baseline: baseline.clone(),
                token: token.clone(),
            });
            (slot.generation, baseline)
        };

        let title = Arc::clone(&self.title);
        let flash = Arc::clone(&self.flash);
        let alert_title = request.title.clone();
        let cycles = self.config.title_flash_cycles;
        let interval = self.config.title_flash_interval;
        tokio::spawn(async move {
            for cycle in 0..cycles {
                let shown = if cycle % 2 == 0 {
                    alert_title.as_str()
                } else {
                    baseline.as_str()
                };
                title.set(shown);
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
            }
            let Ok(mut slot) = flash.lock() else {
                return;
            };
            // A newer flash took over the title and will restore it itself.
            if slot
                .active
                .as_ref()
                .is_some_and(|active| active.generation == generation)
            {
                slot.active = None;
                title.set(&baseline);
            }
        });
    }
}
