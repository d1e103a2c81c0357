//! Free-text travel wish to one recommended destination.
//!
//! The generative model is asked first. Any failure (no credential, network,
//! unparseable or empty answer) falls through to a fixed keyword ladder, so
//! [`ChatIntentResolver::resolve`] always produces exactly one destination.

use std::sync::Arc;

use crate::generative::{GenerationSettings, GenerativeModel};
use crate::parse::try_parse;
use crate::trip::{ChatDestination, ChatReply, ChatRole, ChatTurn};

/// One rung of the keyword ladder. Matching is substring on the lower-cased wish.
pub struct KeywordRule {
    pub keywords: &'static [&'static str],
    pub city: &'static str,
    pub reason: &'static str,
    pub response: &'static str,
}

impl KeywordRule {
    fn matches(&self, lowered_wish: &str) -> bool {
        self.keywords.iter().any(|k| lowered_wish.contains(k))
    }

    fn reply(&self) -> ChatReply {
        ChatReply {
            response: self.response.to_string(),
            destinations: vec![ChatDestination {
                city: self.city.to_string(),
                reason: self.reason.to_string(),
            }],
        }
    }
}

/// Ordered; the first rule with a matching keyword wins.
pub const KEYWORD_LADDER: &[KeywordRule] = &[
    KeywordRule {
        keywords: &["sushi", "japon", "ramen", "manga", "anime"],
        city: "Tokyo, Japon",
        reason: "Capitale mondiale de la culture japonaise, du sushi authentique et de la modernité",
        response: "Pour une expérience japonaise authentique, Tokyo est LA destination incontournable ! Entre traditions millénaires et ultra-modernité, vous y découvrirez le meilleur sushi au monde.",
    },
    KeywordRule {
        keywords: &["plage", "mer", "soleil", "bronzer", "baignade"],
        city: "Maldives",
        reason: "Eaux cristallines, plages de sable blanc et tranquillité absolue",
        response: "Les Maldives sont le paradis terrestre pour les amoureux de plages ! Des lagons turquoise, des bungalows sur pilotis et une sérénité incomparable vous attendent.",
    },
    KeywordRule {
        keywords: &["épice", "couleur", "souk", "maroc", "tajine"],
        city: "Marrakech, Maroc",
        reason: "Souks envoûtants, palais somptueux et cuisine aux mille saveurs",
        response: "Marrakech éveillera tous vos sens ! Entre les souks colorés de la médina, les jardins luxuriants et les tajines parfumés, c'est une immersion totale dans la magie orientale.",
    },
    KeywordRule {
        keywords: &["montagne", "neige", "ski", "alpes", "randonnée"],
        city: "Chamonix, France",
        reason: "Au pied du Mont-Blanc, paradis des sports de montagne",
        response: "Chamonix est le temple de la montagne ! Avec le Mont-Blanc en toile de fond, c'est l'endroit rêvé pour le ski, l'alpinisme ou simplement admirer des panoramas à couper le souffle.",
    },
    KeywordRule {
        keywords: &["romantique", "amour", "couple", "lune de miel"],
        city: "Paris, France",
        reason: "La ville de l'amour par excellence",
        response: "Paris, ville lumière et capitale de l'amour ! Promenades sur les quais de Seine, dîner vue sur la Tour Eiffel, Montmartre au coucher du soleil. Le romantisme à l'état pur.",
    },
    KeywordRule {
        keywords: &["fête", "club", "nightlife", "soirée", "danse"],
        city: "Ibiza, Espagne",
        reason: "Capitale mondiale de la fête et des clubs légendaires",
        response: "Ibiza est THE place to be pour faire la fête ! Des clubs mythiques, des DJ de renommée mondiale et une ambiance électrique du coucher au lever du soleil.",
    },
    KeywordRule {
        keywords: &["histoire", "antique", "romain", "musée", "patrimoine"],
        city: "Rome, Italie",
        reason: "3000 ans d'histoire, du Colisée au Vatican",
        response: "Rome est un musée à ciel ouvert ! Le Colisée, le Forum, le Vatican. Chaque rue raconte une histoire millénaire, une plongée fascinante dans l'Antiquité.",
    },
    KeywordRule {
        keywords: &["safari", "animaux", "savane", "lion", "éléphant"],
        city: "Masai Mara, Kenya",
        reason: "Le plus grand spectacle de vie sauvage au monde",
        response: "Le Masai Mara vous offre le safari ultime ! Lions, éléphants et girafes dans leur habitat naturel, et la grande migration des gnous. Une expérience qui change une vie.",
    },
    KeywordRule {
        keywords: &["nature", "jungle", "biodiversité", "écologie"],
        city: "Costa Rica",
        reason: "Biodiversité exceptionnelle entre jungle et plages",
        response: "Le Costa Rica est un joyau de biodiversité ! Forêts tropicales, volcans actifs, plages des deux océans et une faune incroyable. Le paradis des amoureux de nature.",
    },
    KeywordRule {
        keywords: &["aventure", "extrême", "adrénaline", "sport"],
        city: "Queenstown, Nouvelle-Zélande",
        reason: "Capitale mondiale de l'aventure et des sports extrêmes",
        response: "Queenstown est la mecque de l'aventure ! Saut à l'élastique, parapente, jet boat et ski dans un décor de montagnes et de lacs à couper le souffle.",
    },
    KeywordRule {
        keywords: &["budget", "pas cher", "économique", "backpack"],
        city: "Lisbonne, Portugal",
        reason: "Charme européen à prix doux, gastronomie et soleil",
        response: "Lisbonne offre le meilleur rapport qualité-prix d'Europe ! Ruelles colorées, pastéis de nata, fado et soleil, le tout sans se ruiner.",
    },
    KeywordRule {
        keywords: &["temple", "bouddhisme", "spirituel", "méditation"],
        city: "Bali, Indonésie",
        reason: "Île des dieux, temples et spiritualité",
        response: "Bali est l'île de la spiritualité ! Temples majestueux, rizières en terrasses, cérémonies hindoues et retraites yoga. Un voyage intérieur autant qu'extérieur.",
    },
    KeywordRule {
        keywords: &["aurore", "boréale", "nord", "polaire"],
        city: "Tromsø, Norvège",
        reason: "Meilleur spot au monde pour observer les aurores boréales",
        response: "Tromsø est LE spot pour les aurores boréales ! De septembre à mars, le ciel s'embrase de vert et de violet. Un spectacle magique et inoubliable.",
    },
    KeywordRule {
        keywords: &["vin", "vignoble", "dégustation", "œnologie"],
        city: "Bordeaux, France",
        reason: "Capitale mondiale du vin, châteaux et grands crus",
        response: "Bordeaux est le paradis des amateurs de vin ! Visites de châteaux prestigieux, dégustations de grands crus et gastronomie raffinée dans la plus belle région viticole.",
    },
    KeywordRule {
        keywords: &["carnaval", "brésil", "samba", "rio"],
        city: "Rio de Janeiro, Brésil",
        reason: "Carnaval légendaire, plages mythiques et joie de vivre",
        response: "Rio, c'est l'énergie pure ! Le Christ Rédempteur, Copacabana, le carnaval. La ville vibre au rythme de la samba et de la joie de vivre brésilienne.",
    },
];

/// Used when no rule matches.
pub const DEFAULT_RULE: KeywordRule = KeywordRule {
    keywords: &[],
    city: "Paris, France",
    reason: "La ville lumière offre une expérience complète : culture, gastronomie et romantisme",
    response: "Voici une destination qui pourrait vous plaire ! Paris combine culture, gastronomie et romantisme pour une expérience inoubliable.",
};

pub fn resolve_from_keywords(wish: &str) -> ChatReply {
    let lowered = wish.to_lowercase();
    KEYWORD_LADDER
        .iter()
        .find(|rule| rule.matches(&lowered))
        .unwrap_or(&DEFAULT_RULE)
        .reply()
}

pub fn build_prompt(wish: &str) -> String {
    format!(
        r#"Tu es un assistant de voyage expert. L'utilisateur exprime une envie : "{wish}"

Analyse son envie et suggère LA destination idéale qui y correspond le mieux.

Réponds UNIQUEMENT avec ce format JSON (sans markdown, sans balises) :
{{
  "response": "Explication enthousiaste de pourquoi cette destination est parfaite pour son envie (3-4 phrases)",
  "destinations": [
    {{"city": "Ville, Pays", "reason": "La raison principale qui en fait LE choix idéal"}}
  ]
}}

Exemples :
- "sushi" → Tokyo, Japon (capitale mondiale du sushi authentique)
- "plage paradisiaque" → Maldives (eaux cristallines, tranquillité absolue)
- "aurores boréales" → Tromsø, Norvège (meilleur spot d'observation)
- "budget serré" → Lisbonne, Portugal (excellent rapport qualité-prix)
- "épices et couleurs" → Marrakech, Maroc (souks, médina, saveurs)
- "histoire ancienne" → Rome, Italie (Colisée, Vatican, 3000 ans d'histoire)
- "nature sauvage" → Costa Rica (biodiversité exceptionnelle)
- "fête et nightlife" → Ibiza, Espagne (clubs légendaires)
- "romantique" → Paris, France (ville de l'amour)
- "aventure" → Queenstown, Nouvelle-Zélande (capitale mondiale de l'aventure)

Choisis UNE SEULE destination, la meilleure pour cette envie précise.
Réponds uniquement en JSON valide, rien d'autre."#
    )
}

#[derive(Clone)]
pub struct ChatIntentResolver {
    model: Option<Arc<dyn GenerativeModel>>,
}

impl ChatIntentResolver {
    pub fn new(model: Option<Arc<dyn GenerativeModel>>) -> Self {
        Self { model }
    }

    pub fn is_configured(&self) -> bool {
        self.model.is_some()
    }

    /// Always returns exactly one destination.
    pub async fn resolve(&self, wish: &str) -> ChatReply {
        let wish = wish.trim();
        let Some(model) = self.model.as_ref().filter(|_| !wish.is_empty()) else {
            return resolve_from_keywords(wish);
        };

        let raw = match model.generate(&build_prompt(wish), &GenerationSettings::CHAT).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "chat generation failed, using keyword ladder");
                return resolve_from_keywords(wish);
            }
        };

        match try_parse::<ChatReply>(&raw) {
            Ok(reply) => match single_destination(reply) {
                Some(reply) => reply,
                None => {
                    tracing::warn!("model proposed no destination, using keyword ladder");
                    resolve_from_keywords(wish)
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, "chat answer unparseable, using keyword ladder");
                resolve_from_keywords(wish)
            }
        }
    }
}

fn single_destination(mut reply: ChatReply) -> Option<ChatReply> {
    reply.destinations.retain(|d| !d.city.trim().is_empty());
    reply.destinations.truncate(1);
    (!reply.destinations.is_empty()).then_some(reply)
}

/// Client-side transcript for an interactive conversation.
#[derive(Debug, Clone, Default)]
pub struct ChatSession {
    turns: Vec<ChatTurn>,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    pub fn push_user(&mut self, text: impl Into<String>) {
        self.turns.push(ChatTurn {
            role: ChatRole::User,
            text: text.into(),
            destinations: Vec::new(),
        });
    }

    pub fn push_assistant(&mut self, reply: ChatReply) {
        self.turns.push(ChatTurn {
            role: ChatRole::Assistant,
            text: reply.response,
            destinations: reply.destinations,
        });
    }

    /// Most recent destination the assistant proposed.
    pub fn last_destination(&self) -> Option<&ChatDestination> {
        self.turns
            .iter()
            .rev()
            .filter(|t| t.role == ChatRole::Assistant)
            .find_map(|t| t.destinations.first())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generative::fake::ScriptedModel;

    fn city(reply: &ChatReply) -> &str {
        &reply.destinations[0].city
    }

    #[tokio::test]
    async fn sushi_wish_falls_back_to_tokyo_when_model_fails() {
        let model = Arc::new(ScriptedModel::failing());
        let resolver = ChatIntentResolver::new(Some(model.clone()));

        let reply = resolver.resolve("j'ai envie de sushi").await;

        assert_eq!(model.call_count(), 1);
        assert_eq!(reply.destinations.len(), 1);
        assert_eq!(city(&reply), "Tokyo, Japon");
    }

    #[tokio::test]
    async fn model_answer_is_truncated_to_one_destination() {
        let model = ScriptedModel::answering(
            "```json\n{\"response\": \"Kyoto !\", \"destinations\": [{\"city\": \"Kyoto, Japon\", \"reason\": \"Temples\"}, {\"city\": \"Nara, Japon\", \"reason\": \"Cerfs\"}]}\n```",
        );
        let resolver = ChatIntentResolver::new(Some(Arc::new(model)));

        let reply = resolver.resolve("des temples anciens").await;

        assert_eq!(reply.response, "Kyoto !");
        assert_eq!(reply.destinations.len(), 1);
        assert_eq!(city(&reply), "Kyoto, Japon");
    }

    #[tokio::test]
    async fn unusable_model_answers_use_the_ladder() {
        for answer in [
            "Je vous conseille Tokyo.",
            "{\"response\": \"Hmm\", \"destinations\": []}",
            "{\"response\": \"Hmm\"}",
        ] {
            let resolver = ChatIntentResolver::new(Some(Arc::new(ScriptedModel::answering(answer))));
            let reply = resolver.resolve("plage et soleil").await;
            assert_eq!(city(&reply), "Maldives", "answer: {answer}");
        }
    }

    #[tokio::test]
    async fn blank_wish_skips_the_model() {
        let model = Arc::new(ScriptedModel::answering("{}"));
        let resolver = ChatIntentResolver::new(Some(model.clone()));

        let reply = resolver.resolve("   ").await;

        assert_eq!(model.call_count(), 0);
        assert_eq!(city(&reply), "Paris, France");
    }

    #[tokio::test]
    async fn no_model_uses_the_ladder() {
        let reply = ChatIntentResolver::new(None).resolve("Safari en famille").await;
        assert_eq!(city(&reply), "Masai Mara, Kenya");
    }

    #[test]
    fn first_matching_rule_wins() {
        // "plage" (rung 2) and "vin" (rung 14) both match
        assert_eq!(city(&resolve_from_keywords("plage et vin")), "Maldives");
        // "sushi" (rung 1) beats "budget" (rung 11)
        assert_eq!(city(&resolve_from_keywords("sushi petit budget")), "Tokyo, Japon");
    }

    #[test]
    fn matching_is_case_insensitive_and_substring() {
        assert_eq!(city(&resolve_from_keywords("AURORES en hiver")), "Tromsø, Norvège");
        assert_eq!(city(&resolve_from_keywords("randonnées")), "Chamonix, France");
    }

    #[test]
    fn unmatched_wish_defaults_to_paris() {
        let reply = resolve_from_keywords("xyz");
        assert_eq!(city(&reply), "Paris, France");
        assert_eq!(reply.response, DEFAULT_RULE.response);
    }

    #[test]
    fn every_rung_is_reachable_by_its_first_keyword() {
        for (index, rule) in KEYWORD_LADDER.iter().enumerate() {
            let winner = KEYWORD_LADDER
                .iter()
                .position(|r| r.matches(rule.keywords[0]))
                .unwrap();
            assert_eq!(winner, index, "rule {index} shadowed by rule {winner}");
        }
    }

    #[test]
    fn prompt_quotes_the_wish() {
        let prompt = build_prompt("voir des baleines");
        assert!(prompt.contains("\"voir des baleines\""));
        assert!(prompt.contains("UNE SEULE destination"));
    }

    #[test]
    fn session_tracks_last_proposed_destination() {
        let mut session = ChatSession::new();
        assert!(session.last_destination().is_none());

        session.push_user("sushi");
        session.push_assistant(resolve_from_keywords("sushi"));
        session.push_user("plutôt la plage");
        session.push_assistant(resolve_from_keywords("plage"));

        assert_eq!(session.turns().len(), 4);
        assert_eq!(session.turns()[0].role, ChatRole::User);
        assert_eq!(session.last_destination().unwrap().city, "Maldives");
    }
}
