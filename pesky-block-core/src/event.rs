//! Events emitted by the engine for the rendering layer.
//!
//! The engine is headless. Everything visible (the agent window moving, the
//! payload sliding, the rope between them, typed text, the final sequence)
//! is communicated through this channel and drawn by the embedder. Events
//! are fire-and-forget; a closed receiver is treated as "nobody is
//! watching" and dropped silently.

use std::fmt;
use tokio::sync::mpsc;

/// Kinds of major pranks, used in start/end notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrankKind {
    /// Image heist: the agent drags a fake image viewer off screen.
    ImageHeist,
    /// Editor heist: the agent drags in a fake editor and types into it.
    EditorHeist,
    /// Angry chase toward the cursor after repeated drags.
    AngryCatch,
    /// March toward the foreground window's close button.
    WindowKill,
    /// Cursor dragging and input-blocker windows.
    MouseLock,
    /// Tight orbit around the cursor.
    CloseAttack,
    /// Cursor-pong minigame against the agent.
    PingPong,
    /// The click-the-dots ending sequence.
    FinalSequence,
}

impl fmt::Display for PrankKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PrankKind::ImageHeist => "image-heist",
            PrankKind::EditorHeist => "editor-heist",
            PrankKind::AngryCatch => "angry-catch",
            PrankKind::WindowKill => "window-kill",
            PrankKind::MouseLock => "mouse-lock",
            PrankKind::CloseAttack => "close-attack",
            PrankKind::PingPong => "ping-pong",
            PrankKind::FinalSequence => "final-sequence",
        };
        write!(f, "{name}")
    }
}

/// Stages of the final sequence, surfaced so the embedder can switch scenes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalStageEvent {
    /// The three clickable dots are on screen.
    Dots,
    /// The face is revealed and the farewell message is being typed.
    Ending,
    /// The horror mini-game is running.
    Game,
    /// The sequence is over and the agent is back.
    Done,
}

/// Events emitted by the engine during operation.
#[derive(Debug, Clone)]
pub enum Event {
    /// The agent moved to a new position.
    AgentMoved {
        /// New x coordinate (top-left).
        x: i32,
        /// New y coordinate (top-left).
        y: i32,
    },

    /// The agent's facial emotion changed.
    EmotionChanged {
        /// Name of the new emotion, e.g. "mad".
        emotion: &'static str,
    },

    /// The agent bounced off a screen edge. Only emitted when sounds are on.
    Bounce {
        /// Relative volume in [0, 1].
        volume: f64,
    },

    /// A short alert sound should play. Only emitted when sounds are on.
    Alert,

    /// A desktop notification should be shown.
    Notification {
        /// Notification title.
        title: String,
        /// Notification body.
        body: String,
    },

    /// A major prank started.
    PrankStarted {
        /// Which prank.
        kind: PrankKind,
    },

    /// A major prank ended.
    PrankEnded {
        /// Which prank.
        kind: PrankKind,
    },

    /// The heist payload window moved.
    PayloadMoved {
        /// New x coordinate.
        x: i32,
        /// New y coordinate.
        y: i32,
    },

    /// The heist payload window should be destroyed.
    PayloadClosed,

    /// The rope between agent and payload changed shape.
    RopeUpdated {
        /// Polyline points from agent edge to payload edge.
        points: Vec<(i32, i32)>,
    },

    /// The rope should be removed.
    RopeRemoved,

    /// Text was typed into the fake editor.
    EditorTyped {
        /// The chunk appended to the editor contents.
        text: String,
    },

    /// A clone of the agent appeared.
    CloneSpawned {
        /// Initial x coordinate.
        x: i32,
        /// Initial y coordinate.
        y: i32,
    },

    /// The clone moved.
    CloneMoved {
        /// New x coordinate.
        x: i32,
        /// New y coordinate.
        y: i32,
    },

    /// The clone disappeared.
    CloneDespawned,

    /// The cursor-pong ball moved.
    BallMoved {
        /// New x coordinate.
        x: i32,
        /// New y coordinate.
        y: i32,
    },

    /// The final sequence advanced to a new stage.
    FinalStageChanged {
        /// The stage now active.
        stage: FinalStageEvent,
    },

    /// The clickable dots pulsed (grow/shrink flourish).
    DotsPulse {
        /// Current dot radius in pixels.
        radius: i32,
    },

    /// The face overlay was revealed.
    FaceRevealed,

    /// Another character of the farewell message was typed.
    MessageTyped {
        /// The message typed so far.
        text: String,
    },

    /// Horror mini-game HUD update.
    HorrorHud {
        /// Items collected so far.
        score: u32,
        /// Items needed to win.
        goal: u32,
    },

    /// The horror mini-game collectible moved.
    CollectibleMoved {
        /// New x coordinate.
        x: i32,
        /// New y coordinate.
        y: i32,
    },

    /// The horror mini-game enemy moved.
    EnemyMoved {
        /// New x coordinate.
        x: i32,
        /// New y coordinate.
        y: i32,
    },

    /// A fullscreen jump scare should flash.
    JumpScare,

    /// A creepy text fragment should flash on screen.
    ScaryText {
        /// The fragment to show.
        text: String,
    },

    /// A scare-mode editor window opened with the given contents.
    ScaryEditorSpawned {
        /// Window title.
        title: String,
        /// Initial contents.
        body: String,
    },

    /// The agent teleported instead of moving smoothly.
    Teleported {
        /// New x coordinate.
        x: i32,
        /// New y coordinate.
        y: i32,
    },

    /// The agent came back after the ending.
    Resurrected,
}

impl Event {
    /// Create an agent movement event.
    pub fn agent_moved(x: i32, y: i32) -> Self {
        Self::AgentMoved { x, y }
    }

    /// Create an emotion change event.
    pub fn emotion(emotion: &'static str) -> Self {
        Self::EmotionChanged { emotion }
    }

    /// Create a notification event.
    pub fn notification(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::Notification {
            title: title.into(),
            body: body.into(),
        }
    }

    /// Create a prank start event.
    pub fn prank_started(kind: PrankKind) -> Self {
        Self::PrankStarted { kind }
    }

    /// Create a prank end event.
    pub fn prank_ended(kind: PrankKind) -> Self {
        Self::PrankEnded { kind }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::AgentMoved { x, y } => write!(f, "agent moved to ({x}, {y})"),
            Event::EmotionChanged { emotion } => write!(f, "emotion changed to {emotion}"),
            Event::Bounce { volume } => write!(f, "bounce (volume {volume:.2})"),
            Event::Alert => write!(f, "alert"),
            Event::Notification { title, .. } => write!(f, "notification: {title}"),
            Event::PrankStarted { kind } => write!(f, "prank started: {kind}"),
            Event::PrankEnded { kind } => write!(f, "prank ended: {kind}"),
            Event::PayloadMoved { x, y } => write!(f, "payload moved to ({x}, {y})"),
            Event::PayloadClosed => write!(f, "payload closed"),
            Event::RopeUpdated { points } => write!(f, "rope updated ({} points)", points.len()),
            Event::RopeRemoved => write!(f, "rope removed"),
            Event::EditorTyped { text } => write!(f, "editor typed {} chars", text.len()),
            Event::CloneSpawned { x, y } => write!(f, "clone spawned at ({x}, {y})"),
            Event::CloneMoved { x, y } => write!(f, "clone moved to ({x}, {y})"),
            Event::CloneDespawned => write!(f, "clone despawned"),
            Event::BallMoved { x, y } => write!(f, "ball at ({x}, {y})"),
            Event::FinalStageChanged { stage } => write!(f, "final stage: {stage:?}"),
            Event::DotsPulse { radius } => write!(f, "dots pulse (r={radius})"),
            Event::FaceRevealed => write!(f, "face revealed"),
            Event::MessageTyped { text } => write!(f, "message typed: {text:?}"),
            Event::HorrorHud { score, goal } => write!(f, "horror hud {score}/{goal}"),
            Event::CollectibleMoved { x, y } => write!(f, "collectible at ({x}, {y})"),
            Event::EnemyMoved { x, y } => write!(f, "enemy at ({x}, {y})"),
            Event::JumpScare => write!(f, "jump scare"),
            Event::ScaryText { text } => write!(f, "scary text: {text:?}"),
            Event::ScaryEditorSpawned { title, .. } => write!(f, "scary editor: {title}"),
            Event::Teleported { x, y } => write!(f, "teleported to ({x}, {y})"),
            Event::Resurrected => write!(f, "resurrected"),
        }
    }
}

/// Sending half of the event channel.
pub type EventSender = mpsc::UnboundedSender<Event>;

/// Receiving half of the event channel.
pub type EventReceiver = mpsc::UnboundedReceiver<Event>;

/// Create a new event channel.
///
/// The channel is unbounded so the engine's synchronous tick code can emit
/// without awaiting. A dropped receiver makes sends fail, which the engine
/// ignores.
pub fn channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}
