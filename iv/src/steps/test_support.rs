//! Shared fixtures for step tests

use std::path::PathBuf;

use tagmatch::{ReferenceData, TagMatcher};

use crate::prompts::PromptLoader;

pub fn reference_data() -> ReferenceData {
    ReferenceData {
        qualifications: serde_json::from_str(
            r#"[
                {"id": 101, "name": "正看護師"},
                {"id": 102, "name": "准看護師"},
                {"id": 201, "name": "ITパスポート"},
                {"id": 301, "name": "介護福祉士"},
                {"id": 302, "name": "介護福祉士"}
            ]"#,
        )
        .unwrap(),
        licenses: serde_json::from_str(
            r#"[
                {"label": "正看護師", "aliases": ["看護師", "ナース", "看護"]},
                {"label": "准看護師", "aliases": ["准看", "看護"]},
                {"label": "ITパスポート", "aliases": ["iパス"]}
            ]"#,
        )
        .unwrap(),
        tags: serde_json::from_str(
            r#"[
                {"id": 1, "name": "賞与あり", "category": "待遇", "aliases": ["ボーナスあり"]},
                {"id": 2, "name": "夜勤なし"},
                {"id": 3, "name": "残業少なめ"},
                {"id": 4, "name": "車通勤可"}
            ]"#,
        )
        .unwrap(),
    }
}

pub fn matcher() -> TagMatcher {
    TagMatcher::new(&reference_data())
}

/// Inline templates that echo step, phase and cycle count
pub fn prompts() -> PromptLoader {
    let mut loader = PromptLoader::empty();
    for step in 2..=6 {
        loader
            .register(
                step,
                &format!("step{} {{{{phase}}}} cycles={{{{cycles}}}}", step),
                PathBuf::from(format!("step{}_test.pmt", step)),
            )
            .unwrap();
    }
    loader
}
