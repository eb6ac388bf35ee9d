//! 任务指令模板

use serde::{Deserialize, Serialize};

use crate::translation::config::is_supported_language;
use crate::translation::error::{TranslationError, TranslationResult};

/// 生成任务
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Task {
    Translate,
    Correct,
    Reformulate,
    Summarize,
}

impl Task {
    /// 采样温度
    pub fn temperature(self) -> f32 {
        match self {
            Task::Translate => 0.3,
            Task::Correct => 0.2,
            Task::Reformulate => 0.4,
            Task::Summarize => 0.3,
        }
    }

    /// 是否要求结构化 JSON 输出
    pub fn is_structured(self) -> bool {
        !matches!(self, Task::Translate)
    }

    pub fn name(self) -> &'static str {
        match self {
            Task::Translate => "translate",
            Task::Correct => "correct",
            Task::Reformulate => "reformulate",
            Task::Summarize => "summarize",
        }
    }
}

const CORRECTION_SYSTEM: &str =
    "Tu es un correcteur orthographique et grammatical interne à DCI. Retourne uniquement du JSON valide.";
const REFORMULATION_SYSTEM: &str =
    "Tu es un assistant de rédaction interne à DCI. Fournis uniquement du JSON valide.";
const SUMMARY_SYSTEM: &str =
    "Tu es l'assistant de compte rendu interne à DCI. Réponds uniquement avec du JSON valide.";

/// 有向语言对的系统指令
pub fn translation_system_prompt(source_lang: &str, target_lang: &str) -> Option<&'static str> {
    let prompt = match (source_lang, target_lang) {
        ("fr", "en") => concat!(
            "You are a translator. Translate the following French text to English. ",
            "Return ONLY the translated text, without any explanation, formatting, or additional content. ",
            "Preserve punctuation and tone."
        ),
        ("fr", "ar") => concat!(
            "أنت مترجم. ترجم النص الفرنسي التالي إلى العربية. أعد النص المترجم فقط، دون أي تفسير أو تنسيق أو محتوى إضافي. ",
            "احتفظ بعلامات الترقيم والنبرة."
        ),
        ("en", "fr") => concat!(
            "Tu es un traducteur. Traduis le texte anglais suivant en français. Retourne UNIQUEMENT le texte traduit, ",
            "sans explication, formatage ou contenu additionnel. Préserve la ponctuation et le ton."
        ),
        ("en", "ar") => concat!(
            "أنت مترجم. ترجم النص الإنجليزي التالي إلى العربية. أعد النص المترجم فقط، دون أي تفسير أو تنسيق أو محتوى إضافي. ",
            "احتفظ بعلامات الترقيم والنبرة."
        ),
        ("ar", "fr") => concat!(
            "Tu es un traducteur. Traduis le texte arabe suivant en français. Retourne UNIQUEMENT le texte traduit, sans explication, ",
            "formatage ou contenu additionnel. Préserve la ponctuation et le ton."
        ),
        ("ar", "en") => concat!(
            "You are a translator. Translate the following Arabic text to English. Return ONLY the translated text, ",
            "without any explanation, formatting, or additional content. Preserve punctuation and tone."
        ),
        _ => return None,
    };
    Some(prompt)
}

/// 任务的指令与正文
#[derive(Debug, Clone, PartialEq)]
pub struct TaskPrompt {
    pub task: Task,
    pub system: String,
    pub prompt: String,
}

impl TaskPrompt {
    /// 翻译指令。语言对不在支持集合内时不会产生请求
    pub fn translate(text: &str, source_lang: &str, target_lang: &str) -> TranslationResult<Self> {
        let unsupported = || TranslationError::UnsupportedLanguagePair {
            source_lang: source_lang.to_string(),
            target_lang: target_lang.to_string(),
        };

        if !is_supported_language(source_lang) || !is_supported_language(target_lang) {
            return Err(unsupported());
        }
        let system = translation_system_prompt(source_lang, target_lang).ok_or_else(unsupported)?;

        Ok(Self {
            task: Task::Translate,
            system: system.to_string(),
            prompt: text.to_string(),
        })
    }

    pub fn correct(text: &str) -> Self {
        let prompt = format!(
            "Tu es un correcteur professionnel. Corrige le texte suivant en respectant la langue d'origine et le ton employé. \
             Retourne exclusivement un objet JSON respectant exactement cette structure :\n\
             {{\n  \"corrected_text\": \"...\",\n  \"explanations\": [\"...\"]\n}}\n\
             La clé 'corrected_text' doit contenir le texte intégralement corrigé. \
             La clé 'explanations' doit être une liste décrivant brièvement chaque correction importante. \
             Indique qu'aucune correction n'a été nécessaire si le texte est déjà correct.\n\n\
             Texte à corriger :\n{}",
            text
        );

        Self {
            task: Task::Correct,
            system: CORRECTION_SYSTEM.to_string(),
            prompt,
        }
    }

    pub fn reformulate(text: &str) -> Self {
        let prompt = format!(
            "Tu es chargé de reformuler le texte suivant pour l'améliorer (fluidité, clarté, ton professionnel) tout en conservant le sens. \
             Retourne exclusivement un objet JSON avec la structure :\n\
             {{\n  \"reformulated_text\": \"...\",\n  \"highlights\": [\"...\"]\n}}\n\
             La liste 'highlights' doit contenir quelques explications sur les changements importants.\n\n\
             Texte à reformuler :\n{}",
            text
        );

        Self {
            task: Task::Reformulate,
            system: REFORMULATION_SYSTEM.to_string(),
            prompt,
        }
    }

    pub fn summarize(notes: &str) -> Self {
        let prompt = format!(
            "À partir des notes de réunion suivantes, crée un compte rendu clair. \
             Retourne uniquement un JSON respectant la structure :\n\
             {{\n  \"summary\": \"...\",\n  \"decisions\": [\"...\"],\n  \"action_items\": [\"...\"]\n}}\n\
             Le résumé doit être concis (moins de 150 mots). Les décisions et les actions doivent être formulées en phrases courtes.\n\n\
             Notes de réunion :\n{}",
            notes
        );

        Self {
            task: Task::Summarize,
            system: SUMMARY_SYSTEM.to_string(),
            prompt,
        }
    }

    /// 把系统指令并入正文（用于能力受限的模型）
    pub fn folded(&self) -> String {
        format!("{}\n\n{}", self.system, self.prompt)
    }
}
