//! Road-trip idea generation with a curated, shuffled fallback catalog.

use std::sync::Arc;

use rand::Rng;
use rand::seq::SliceRandom;
use serde::Deserialize;

use crate::generative::{GenerationSettings, GenerativeModel};
use crate::parse::parse_or_fallback;
use crate::trip::Suggestion;

/// Number of ideas requested from the model.
pub const SUGGESTION_TARGET: usize = 8;

#[derive(Debug, Deserialize)]
struct SuggestionEnvelope {
    #[serde(default)]
    suggestions: Vec<Suggestion>,
}

#[derive(Clone)]
pub struct SuggestionGenerator {
    model: Option<Arc<dyn GenerativeModel>>,
}

impl SuggestionGenerator {
    /// `None` means no model is configured; every call uses the catalog.
    pub fn new(model: Option<Arc<dyn GenerativeModel>>) -> Self {
        Self { model }
    }

    pub fn is_configured(&self) -> bool {
        self.model.is_some()
    }

    /// Always returns at least one suggestion.
    pub async fn generate(&self, preferences: Option<&serde_json::Value>) -> Vec<Suggestion> {
        let Some(model) = &self.model else {
            tracing::warn!("no generative model configured, serving suggestion catalog");
            return fallback_suggestions();
        };

        let prompt = build_prompt(preferences);
        let raw = match model.generate(&prompt, &GenerationSettings::SUGGESTIONS).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "suggestion generation failed, serving catalog");
                return fallback_suggestions();
            }
        };

        let envelope = parse_or_fallback(&raw, keep_usable, || SuggestionEnvelope {
            suggestions: fallback_suggestions(),
        });
        tracing::info!(count = envelope.suggestions.len(), "suggestions ready");
        envelope.suggestions
    }
}

/// Drop entries a draft could not be seeded from; reject an empty result.
fn keep_usable(mut envelope: SuggestionEnvelope) -> Option<SuggestionEnvelope> {
    envelope.suggestions.retain(|s| {
        !s.title.trim().is_empty() && s.destinations.iter().any(|d| !d.trim().is_empty())
    });
    for suggestion in &mut envelope.suggestions {
        suggestion.destinations.retain(|d| !d.trim().is_empty());
    }
    (!envelope.suggestions.is_empty()).then_some(envelope)
}

pub fn build_prompt(preferences: Option<&serde_json::Value>) -> String {
    let preferences_text = match preferences {
        Some(value) if !value.is_null() => {
            format!("Tiens compte des préférences suivantes : {value}")
        }
        _ => "Varie les styles de voyage.".to_string(),
    };

    format!(
        r#"Tu es un expert en voyage et en planification de roadtrips.

{preferences_text}

Propose {SUGGESTION_TARGET} idées de roadtrip inspirantes et variées.

Réponds UNIQUEMENT avec un objet JSON de cette forme, sans markdown ni balises :
{{
  "suggestions": [
    {{
      "title": "Titre accrocheur",
      "destinations": ["Ville1, Pays1", "Ville2, Pays2", "Ville3, Pays3"],
      "duration": "X jours",
      "description": "Deux ou trois phrases enthousiastes",
      "bestPeriod": "Mois-Mois"
    }}
  ]
}}

Contraintes :
- {SUGGESTION_TARGET} roadtrips différents
- 3 à 4 destinations par roadtrip
- plusieurs continents (Europe, Asie, Amérique, Afrique, Océanie)
- durées entre 5 et 14 jours
- périodes réalistes selon le climat
- tous les budgets représentés

Réponds uniquement en JSON valide."#
    )
}

struct CatalogEntry {
    title: &'static str,
    destinations: &'static [&'static str],
    duration: &'static str,
    description: &'static str,
    best_period: &'static str,
}

const CATALOG: &[CatalogEntry] = &[
    CatalogEntry {
        title: "Roadtrip Italien Classique",
        destinations: &["Rome, Italie", "Florence, Italie", "Venise, Italie"],
        duration: "7 jours",
        description: "Plongez dans l'histoire et l'art italien. De la Rome antique à Venise la romantique, en passant par la Renaissance florentine.",
        best_period: "Avril-Juin ou Septembre-Octobre",
    },
    CatalogEntry {
        title: "Tour du Japon Moderne et Traditionnel",
        destinations: &["Tokyo, Japon", "Kyoto, Japon", "Osaka, Japon"],
        duration: "10 jours",
        description: "Le contraste fascinant entre modernité et tradition, des temples zen aux néons de Tokyo.",
        best_period: "Mars-Mai ou Octobre-Novembre",
    },
    CatalogEntry {
        title: "Californie Côtière en Liberté",
        destinations: &["San Francisco, USA", "Los Angeles, USA", "San Diego, USA"],
        duration: "8 jours",
        description: "La célèbre Highway 1 entre plages dorées, villes iconiques et paysages à couper le souffle.",
        best_period: "Mai-Septembre",
    },
    CatalogEntry {
        title: "Merveilles d'Espagne",
        destinations: &["Madrid, Espagne", "Barcelone, Espagne", "Séville, Espagne"],
        duration: "9 jours",
        description: "Culture, gastronomie et architecture, du flamenco andalou au modernisme catalan.",
        best_period: "Avril-Juin ou Septembre-Octobre",
    },
    CatalogEntry {
        title: "Épices et Couleurs du Maroc",
        destinations: &["Marrakech, Maroc", "Fès, Maroc", "Chefchaouen, Maroc"],
        duration: "6 jours",
        description: "Souks colorés, architecture majestueuse et saveurs envoûtantes.",
        best_period: "Mars-Mai ou Septembre-Novembre",
    },
    CatalogEntry {
        title: "Îles Grecques Paradisiaques",
        destinations: &["Athènes, Grèce", "Santorin, Grèce", "Mykonos, Grèce"],
        duration: "8 jours",
        description: "Villages blancs perchés, mer azur et couchers de soleil légendaires dans les Cyclades.",
        best_period: "Mai-Juin ou Septembre-Octobre",
    },
    CatalogEntry {
        title: "Safari et Plages d'Afrique du Sud",
        destinations: &["Le Cap, Afrique du Sud", "Parc Kruger, Afrique du Sud", "Durban, Afrique du Sud"],
        duration: "12 jours",
        description: "Safaris inoubliables, vignobles réputés et plages de l'océan Indien.",
        best_period: "Mai-Septembre",
    },
    CatalogEntry {
        title: "Temples et Plages de Thaïlande",
        destinations: &["Bangkok, Thaïlande", "Chiang Mai, Thaïlande", "Phuket, Thaïlande"],
        duration: "10 jours",
        description: "Temples dorés, cuisine de rue exceptionnelle et plages paradisiaques.",
        best_period: "Novembre-Mars",
    },
];

impl CatalogEntry {
    fn to_suggestion(&self) -> Suggestion {
        Suggestion {
            title: self.title.to_string(),
            destinations: self.destinations.iter().map(|d| d.to_string()).collect(),
            duration_label: self.duration.to_string(),
            description: self.description.to_string(),
            best_period_label: self.best_period.to_string(),
        }
    }
}

/// The full curated catalog in a fresh random order.
pub fn fallback_suggestions() -> Vec<Suggestion> {
    fallback_suggestions_with(&mut rand::thread_rng())
}

pub fn fallback_suggestions_with<R: Rng + ?Sized>(rng: &mut R) -> Vec<Suggestion> {
    let mut suggestions: Vec<Suggestion> = CATALOG.iter().map(CatalogEntry::to_suggestion).collect();
    suggestions.shuffle(rng);
    suggestions
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::generative::fake::ScriptedModel;

    fn titles(suggestions: &[Suggestion]) -> BTreeSet<String> {
        suggestions.iter().map(|s| s.title.clone()).collect()
    }

    fn catalog_titles() -> BTreeSet<String> {
        CATALOG.iter().map(|e| e.title.to_string()).collect()
    }

    #[test]
    fn catalog_shuffle_is_a_permutation_and_seedable() {
        let a = fallback_suggestions_with(&mut StdRng::seed_from_u64(7));
        let b = fallback_suggestions_with(&mut StdRng::seed_from_u64(7));
        assert_eq!(a, b);
        assert_eq!(a.len(), CATALOG.len());
        assert_eq!(titles(&a), catalog_titles());
    }

    #[test]
    fn prompt_embeds_preferences_or_variety_directive() {
        let prefs = serde_json::json!({"budget": "serré"});
        assert!(build_prompt(Some(&prefs)).contains(r#""budget":"serré""#));
        assert!(build_prompt(None).contains("Varie les styles"));
        assert!(build_prompt(None).contains("\"bestPeriod\""));
    }

    #[tokio::test]
    async fn parses_fenced_model_output() {
        let model = ScriptedModel::answering(
            "```json\n{\"suggestions\": [{\"title\": \"Route 66\", \"destinations\": [\"Chicago, USA\", \"Santa Monica, USA\"], \"duration\": \"14 jours\", \"description\": \"Mythique.\", \"bestPeriod\": \"Mai-Octobre\"}]}\n```",
        );
        let generator = SuggestionGenerator::new(Some(Arc::new(model)));

        let suggestions = generator.generate(None).await;

        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].title, "Route 66");
        assert_eq!(suggestions[0].destinations, ["Chicago, USA", "Santa Monica, USA"]);
    }

    #[tokio::test]
    async fn always_returns_suggestions() {
        let cases: Vec<Option<Arc<dyn GenerativeModel>>> = vec![
            None,
            Some(Arc::new(ScriptedModel::failing())),
            Some(Arc::new(ScriptedModel::answering("Je ne sais pas."))),
            Some(Arc::new(ScriptedModel::answering("{\"suggestions\": []}"))),
            Some(Arc::new(ScriptedModel::answering(
                "{\"suggestions\": [{\"title\": \"\", \"destinations\": []}]}",
            ))),
        ];

        for model in cases {
            let suggestions = SuggestionGenerator::new(model).generate(None).await;
            assert!(!suggestions.is_empty());
            assert_eq!(titles(&suggestions), catalog_titles());
        }
    }

    #[tokio::test]
    async fn preferences_reach_the_model() {
        let model = Arc::new(ScriptedModel::failing());
        let generator = SuggestionGenerator::new(Some(model.clone()));
        let prefs = serde_json::json!({"continent": "Asie"});

        generator.generate(Some(&prefs)).await;

        assert_eq!(model.call_count(), 1);
        assert!(model.prompts.lock().unwrap()[0].contains("Asie"));
    }
}
