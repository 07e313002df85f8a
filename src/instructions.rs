/// Separator used when joining instruction fragments into the single
/// `instructions` string sent to the brain.
pub const SEPARATOR: &str = "\n\n";

/// Fallback escalation used when a suggestion could not be matched.
/// Lower tiers are more specific and tried first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RetryTier {
    /// Offer concrete pool / news-relevant tracks to pick from.
    PoolOffer,
    /// Offer other library tracks by the same artist.
    SameArtist,
    /// Listener request: keep the intent but pick a different artist.
    ListenerRedirect,
    /// Nothing specific left to offer, abandon the artist entirely.
    AbandonArtist,
}

/// Where an instruction fragment came from. Retry fragments carry their
/// escalation tier so tests can inspect it directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstructionKind {
    Weather,
    News,
    ShowTransition,
    MusicStyle,
    Personality,
    ChartTrivia,
    Retry(RetryTier),
}

#[derive(Debug, Clone)]
pub struct InstructionFragment {
    pub kind: InstructionKind,
    pub text: String,
}

/// Ordered list of instruction fragments for one brain call. Fragments are
/// kept separate until `render`, so the escalation state stays inspectable
/// instead of being buried in a concatenated prompt string.
#[derive(Debug, Clone, Default)]
pub struct InstructionSet {
    fragments: Vec<InstructionFragment>,
}

impl InstructionSet {
    pub fn new() -> Self {
        InstructionSet::default()
    }

    pub fn push(&mut self, kind: InstructionKind, text: impl Into<String>) {
        self.fragments.push(InstructionFragment {
            kind,
            text: text.into(),
        });
    }

    /// Replace any previous retry fragment with a new one. A cycle carries at
    /// most one retry instruction at a time, for the latest failed attempt.
    pub fn set_retry(&mut self, tier: RetryTier, text: impl Into<String>) {
        self.fragments
            .retain(|f| !matches!(f.kind, InstructionKind::Retry(_)));
        self.push(InstructionKind::Retry(tier), text);
    }

    pub fn retry_tier(&self) -> Option<RetryTier> {
        self.fragments.iter().find_map(|f| match f.kind {
            InstructionKind::Retry(tier) => Some(tier),
            _ => None,
        })
    }

    pub fn kinds(&self) -> Vec<InstructionKind> {
        self.fragments.iter().map(|f| f.kind).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Join all fragments into the `instructions` string, or `None` when
    /// there is nothing to say.
    pub fn render(&self) -> Option<String> {
        if self.fragments.is_empty() {
            return None;
        }
        Some(
            self.fragments
                .iter()
                .map(|f| f.text.as_str())
                .collect::<Vec<_>>()
                .join(SEPARATOR),
        )
    }
}

/// Header line for the curated-pool offer block. Also written verbatim to
/// the station log, where the report engine recognizes it by prefix.
pub const OTHER_RECOMMENDED_HEADER: &str = "OTHER RECOMMENDED TRACKS (pick one of these):";
/// Header line for the news-relevant offer block.
pub const NEWS_RELEVANT_HEADER: &str =
    "NEWS-RELEVANT TRACKS (tie your announcement to the quoted news item):";

/// Build the tier (a) retry text: an explicit candidate list from the
/// suggestion pool and the news-relevant entries.
pub fn pool_offer_text(pool_lines: &[String], news_lines: &[String]) -> String {
    let mut out = String::from(
        "That track was not available. Please pick one of the following tracks \
         instead and introduce it.",
    );
    if !pool_lines.is_empty() {
        out.push_str("\n\n");
        out.push_str(OTHER_RECOMMENDED_HEADER);
        for line in pool_lines {
            out.push('\n');
            out.push_str(line);
        }
    }
    if !news_lines.is_empty() {
        out.push_str("\n\n");
        out.push_str(NEWS_RELEVANT_HEADER);
        for line in news_lines {
            out.push('\n');
            out.push_str(line);
        }
    }
    out
}

/// Build the tier (b) retry text: other library tracks by the same artist.
pub fn same_artist_text(artist: &str, tracks: &[String]) -> String {
    let mut out = format!(
        "That exact track by {} is not in the library, but these tracks by the \
         same artist are. Please pick one of them and introduce it.",
        artist
    );
    for track in tracks {
        out.push('\n');
        out.push_str(track);
    }
    out
}

/// Build the tier (c) retry text for a failed listener request.
pub fn listener_redirect_text(suggestion: &str) -> String {
    format!(
        "The requested track '{}' is not available. Acknowledge the listener's \
         request on air, then pick a track by a different artist that captures \
         a similar mood.",
        suggestion
    )
}

/// Build the tier (d) retry text: give up on the artist entirely.
pub fn abandon_artist_text(suggestion: &str) -> String {
    format!(
        "'{}' is not available and nothing similar could be found. Please \
         suggest a completely different track by a different artist.",
        suggestion
    )
}
