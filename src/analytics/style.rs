use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StyleCategory {
    HighlyImpositive,
    Impositive,
    Assertive,
    Balanced,
    ListeningFocused,
    Passive,
    HighlyPassive,
    SilentObserver,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AdviceContext {
    General,
    Professional,
    Personal,
    Sales,
}

impl AdviceContext {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "professional" => Self::Professional,
            "personal" => Self::Personal,
            "sales" => Self::Sales,
            _ => Self::General,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleAssessment {
    pub category: StyleCategory,
    pub name: &'static str,
    pub description: &'static str,
    pub characteristics: [&'static str; 4],
    pub advice: &'static str,
}

impl StyleCategory {
    pub const ALL: [StyleCategory; 8] = [
        Self::HighlyImpositive,
        Self::Impositive,
        Self::Assertive,
        Self::Balanced,
        Self::ListeningFocused,
        Self::Passive,
        Self::HighlyPassive,
        Self::SilentObserver,
    ];

    pub fn for_talk_percentage(talk_pct: f64) -> Self {
        match talk_pct {
            p if p >= 80.0 => Self::HighlyImpositive,
            p if p >= 70.0 => Self::Impositive,
            p if p >= 60.0 => Self::Assertive,
            p if p >= 50.0 => Self::Balanced,
            p if p >= 40.0 => Self::ListeningFocused,
            p if p >= 30.0 => Self::Passive,
            p if p >= 20.0 => Self::HighlyPassive,
            _ => Self::SilentObserver,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::HighlyImpositive => "Highly Impositive",
            Self::Impositive => "Impositive",
            Self::Assertive => "Assertive",
            Self::Balanced => "Balanced",
            Self::ListeningFocused => "Listening-Focused",
            Self::Passive => "Passive",
            Self::HighlyPassive => "Highly Passive",
            Self::SilentObserver => "Silent Observer",
        }
    }

    /// Talk percentage band covered by the category.
    pub fn range(self) -> &'static str {
        match self {
            Self::HighlyImpositive => "80-100% talking",
            Self::Impositive => "70-79% talking",
            Self::Assertive => "60-69% talking",
            Self::Balanced => "50-59% talking",
            Self::ListeningFocused => "40-49% talking",
            Self::Passive => "30-39% talking",
            Self::HighlyPassive => "20-29% talking",
            Self::SilentObserver => "0-19% talking",
        }
    }

    pub fn assessment(self) -> StyleAssessment {
        let (description, characteristics, advice) = match self {
            Self::HighlyImpositive => (
                "Extremely dominant communication pattern",
                [
                    "Dominates conversations",
                    "Rarely lets others speak",
                    "May come across as overwhelming",
                    "Strong presence, little listening",
                ],
                "Practice active listening. Pause, ask questions and wait for the answer.",
            ),
            Self::Impositive => (
                "Dominant, controlling communication",
                [
                    "Steers the conversation",
                    "Confident speaker",
                    "May interrupt others",
                    "Seldom asks for input",
                ],
                "Balance talking with listening and ask more open-ended questions.",
            ),
            Self::Assertive => (
                "Confident communication that still leaves room",
                [
                    "Clear communication",
                    "Comfortable stating views",
                    "Leads without dominating",
                    "Respects the other side",
                ],
                "Good balance. Stay confident while keeping space for the other person.",
            ),
            Self::Balanced => (
                "Even give-and-take",
                [
                    "Equal share of the conversation",
                    "Listens and speaks well",
                    "Collaborative",
                    "Builds rapport",
                ],
                "An even split. Keep doing what you are doing.",
            ),
            Self::ListeningFocused => (
                "Thoughtful, considerate communication",
                [
                    "Strong listener",
                    "Considered responses",
                    "Values other opinions",
                    "Supportive",
                ],
                "Strong listening. Share your own thoughts a little more often.",
            ),
            Self::Passive => (
                "Reserved, cautious communication",
                [
                    "Prefers listening to speaking",
                    "Careful with opinions",
                    "Keeps the peace",
                    "May miss chances to contribute",
                ],
                "Your listening is valuable. Speak up more and share what you know.",
            ),
            Self::HighlyPassive => (
                "Very reserved communication pattern",
                [
                    "Little verbal participation",
                    "Avoids conflict",
                    "Can seem disengaged",
                    "Others may not know your view",
                ],
                "Practice putting your view into words. People want to hear it.",
            ),
            Self::SilentObserver => (
                "Almost entirely listening",
                [
                    "Rarely speaks",
                    "Can seem withdrawn",
                    "Processes internally",
                    "Silence may be misread",
                ],
                "Silence is easy to misread. Try to engage out loud more often.",
            ),
        };

        StyleAssessment {
            category: self,
            name: self.name(),
            description,
            characteristics,
            advice,
        }
    }
}

pub fn evaluate_style(talk_pct: f64) -> StyleAssessment {
    StyleCategory::for_talk_percentage(talk_pct).assessment()
}

pub fn style_range(category: StyleCategory) -> &'static str {
    category.range()
}

pub fn contextual_advice(talk_pct: f64, context: AdviceContext) -> &'static str {
    match context {
        AdviceContext::Professional if talk_pct >= 70.0 => {
            "In professional settings, leave room for team input and feedback."
        }
        AdviceContext::Professional if talk_pct <= 30.0 => {
            "In meetings, put your expertise and ideas forward more actively."
        }
        AdviceContext::Personal if talk_pct >= 70.0 => {
            "With people close to you, listening builds the deeper connection."
        }
        AdviceContext::Personal if talk_pct <= 30.0 => {
            "Share your feelings and thoughts more openly with the people close to you."
        }
        AdviceContext::Sales if talk_pct >= 60.0 => {
            "Fine for a pitch, but let the customer do most of the talking."
        }
        AdviceContext::Sales if talk_pct <= 40.0 => {
            "You listen well. Now practice presenting your solution with confidence."
        }
        _ => evaluate_style(talk_pct).advice,
    }
}
