// ********* Label vocabulary ***********

use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Text written into blank survey cells before classification.
pub const NO_RESPONSE_TEXT: &str = "Sin respuesta";

/// Text of the `Error` sentinel.
pub const ERROR_TEXT: &str = "Error";

/// One emotion tag, or one of the two sentinels.
///
/// The ten emotions are a closed set. Anything that cannot be matched
/// against it becomes `Error`, never a guess.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Label {
    Satisfaction,
    Frustration,
    Engagement,
    Demotivation,
    Stress,
    Hope,
    Insecurity,
    Appreciation,
    Indifference,
    Exhaustion,
    /// The label could not be determined.
    Error,
    /// The source cell was empty.
    NoResponse,
}

/// The valid labels, in canonical order.
///
/// The order is used for chart categories and count tables, so it must stay stable.
pub const LABELS: [Label; 10] = [
    Label::Satisfaction,
    Label::Frustration,
    Label::Engagement,
    Label::Demotivation,
    Label::Stress,
    Label::Hope,
    Label::Insecurity,
    Label::Appreciation,
    Label::Indifference,
    Label::Exhaustion,
];

/// How free text is matched against the vocabulary.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum NormalizationMode {
    /// The folded text must be exactly one of the labels.
    Strict,
    /// The first label (in canonical order) contained in the folded text wins.
    Lenient,
}

impl Label {
    /// The canonical text of the label, as shown to the classifier and written to files.
    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Satisfaction => "satisfacción",
            Label::Frustration => "frustración",
            Label::Engagement => "compromiso",
            Label::Demotivation => "desmotivación",
            Label::Stress => "estrés",
            Label::Hope => "esperanza",
            Label::Insecurity => "inseguridad",
            Label::Appreciation => "aprecio",
            Label::Indifference => "indiferencia",
            Label::Exhaustion => "agotamiento",
            Label::Error => ERROR_TEXT,
            Label::NoResponse => NO_RESPONSE_TEXT,
        }
    }

    /// True for `Error` and `NoResponse`, which carry no signal.
    pub fn is_sentinel(&self) -> bool {
        matches!(self, Label::Error | Label::NoResponse)
    }

    /// Contribution of the label to the satisfaction score, in [-1, 1].
    /// Sentinels have no weight.
    pub fn weight(&self) -> Option<f64> {
        let w = match self {
            Label::Satisfaction | Label::Engagement | Label::Appreciation => 1.0,
            Label::Hope => 0.8,
            Label::Indifference => 0.0,
            Label::Insecurity => -0.3,
            Label::Frustration => -0.5,
            Label::Demotivation => -0.8,
            Label::Stress | Label::Exhaustion => -1.0,
            Label::Error | Label::NoResponse => return None,
        };
        Some(w)
    }

    pub fn glyph(&self) -> &'static str {
        match self {
            Label::Satisfaction => "😊",
            Label::Frustration => "😠",
            Label::Engagement => "💪",
            Label::Demotivation => "😞",
            Label::Stress => "😣",
            Label::Hope => "🌟",
            Label::Insecurity => "😟",
            Label::Appreciation => "🤝",
            Label::Indifference => "😐",
            Label::Exhaustion => "😩",
            Label::Error | Label::NoResponse => "",
        }
    }
}

impl Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<Label> for String {
    fn from(l: Label) -> String {
        l.as_str().to_string()
    }
}

impl From<String> for Label {
    fn from(s: String) -> Label {
        normalize(&s, NormalizationMode::Strict)
    }
}

/// Lower-cases, trims and removes the Spanish diacritics.
fn fold(text: &str) -> String {
    text.trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'á' | 'à' | 'ä' => 'a',
            'é' | 'è' | 'ë' => 'e',
            'í' | 'ì' | 'ï' => 'i',
            'ó' | 'ò' | 'ö' => 'o',
            'ú' | 'ù' | 'ü' => 'u',
            x => x,
        })
        .collect()
}

/// Maps free text to a label.
///
/// Pure and total: text that does not match the vocabulary yields `Error`.
/// The placeholder of blank cells maps to `NoResponse`, so that
/// `normalize(normalize(x).as_str()) == normalize(x)` for any text.
pub fn normalize(text: &str, mode: NormalizationMode) -> Label {
    let folded = fold(text);
    if folded == fold(NO_RESPONSE_TEXT) {
        return Label::NoResponse;
    }
    if let Some(l) = LABELS.iter().find(|l| fold(l.as_str()) == folded) {
        return *l;
    }
    match mode {
        NormalizationMode::Strict => Label::Error,
        NormalizationMode::Lenient if folded.is_empty() => Label::Error,
        NormalizationMode::Lenient => LABELS
            .iter()
            .find(|l| folded.contains(&fold(l.as_str())))
            .cloned()
            .unwrap_or(Label::Error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_matching_folds_case_and_accents() {
        let m = NormalizationMode::Strict;
        assert_eq!(normalize("  Satisfacción ", m), Label::Satisfaction);
        assert_eq!(normalize("ESTRES", m), Label::Stress);
        assert_eq!(normalize("desmotivacion\n", m), Label::Demotivation);
        assert_eq!(normalize("muy estresado", m), Label::Error);
        assert_eq!(normalize("", m), Label::Error);
        assert_eq!(normalize("sin respuesta", m), Label::NoResponse);
    }

    #[test]
    fn lenient_matching_takes_first_canonical_label() {
        let m = NormalizationMode::Lenient;
        assert_eq!(normalize("Emoción: estrés.", m), Label::Stress);
        assert_eq!(normalize("frustración y agotamiento", m), Label::Frustration);
        assert_eq!(normalize("no sé", m), Label::Error);
        assert_eq!(normalize("   ", m), Label::Error);
    }

    #[test]
    fn normalization_is_idempotent() {
        let samples = [
            "aprecio",
            "Aprecio!",
            "",
            "Error",
            "Sin respuesta",
            "algo de esperanza",
            "INDIFERENCIA",
            "🙂",
        ];
        for mode in [NormalizationMode::Strict, NormalizationMode::Lenient] {
            for s in samples {
                let once = normalize(s, mode);
                assert_eq!(normalize(once.as_str(), mode), once, "input {:?}", s);
            }
        }
    }

    #[test]
    fn every_label_has_a_weight_in_range() {
        for l in LABELS {
            let w = l.weight().unwrap();
            assert!((-1.0..=1.0).contains(&w));
            assert!(!l.glyph().is_empty());
        }
        assert_eq!(Label::Error.weight(), None);
        assert_eq!(Label::NoResponse.weight(), None);
    }

    #[test]
    fn labels_serialize_as_canonical_text() {
        let js = serde_json::to_string(&Label::Stress).unwrap();
        assert_eq!(js, "\"estrés\"");
        let l: Label = serde_json::from_str("\"Compromiso\"").unwrap();
        assert_eq!(l, Label::Engagement);
        let l: Label = serde_json::from_str("\"cansancio\"").unwrap();
        assert_eq!(l, Label::Error);
    }
}
