//! ローカル音声の選択
//!
//! ロケールに一致し、かつローカルにインストールされた音声を優先する。
//! 一致するものがなければエンジン既定の音声に任せる（ブロックしない）。

/// ローカル合成エンジンの音声
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalVoice {
    pub name: String,
    pub lang: String,
    /// ローカルにインストールされた音声か
    pub local_service: bool,
    /// エンジンの既定音声か
    pub is_default: bool,
}

/// 言語サブタグに対応する音声名中の英語名
fn language_name(primary: &str) -> Option<&'static str> {
    match primary {
        "zh" | "cmn" | "yue" => Some("chinese"),
        "en" => Some("english"),
        "ja" => Some("japanese"),
        "ko" => Some("korean"),
        _ => None,
    }
}

/// 音声がロケールに一致するか
pub fn locale_matches(voice: &LocalVoice, locale: &str) -> bool {
    let locale = locale.to_lowercase();
    let mut parts = locale.split(['-', '_']);
    let primary = parts.next().unwrap_or_default();
    let region = parts.next();
    let lang = voice.lang.to_lowercase();

    if primary.is_empty() {
        return false;
    }

    let lang_primary = lang.split(['-', '_']).next().unwrap_or_default();
    if lang_primary == primary || lang.contains(&format!("-{}", primary)) {
        return true;
    }
    // espeak-ng は中国語を cmn / yue で表す
    if primary == "zh" && matches!(lang_primary, "cmn" | "yue") {
        return true;
    }
    if let Some(region) = region {
        if region.len() == 2 && lang.ends_with(&format!("-{}", region)) {
            return true;
        }
    }
    language_name(primary).is_some_and(|name| voice.name.to_lowercase().contains(name))
}

/// 最適な音声を選ぶ
pub fn best_voice<'a>(voices: &'a [LocalVoice], locale: &str) -> Option<&'a LocalVoice> {
    let matching: Vec<&LocalVoice> = voices.iter().filter(|v| locale_matches(v, locale)).collect();

    matching
        .iter()
        .find(|v| v.local_service)
        .or_else(|| matching.iter().find(|v| v.is_default))
        .or_else(|| matching.first())
        .copied()
}

/// `espeak-ng --voices` の出力を解析
///
/// ```text
/// Pty Language       Age/Gender VoiceName          File                 Other Languages
///  5  cmn             --/M      Chinese_(Mandarin) sit/cmn              (zh-cmn 5)(zh 5)
/// ```
pub fn parse_espeak_voices(output: &str) -> Vec<LocalVoice> {
    output
        .lines()
        .skip(1)
        .filter_map(|line| {
            let mut columns = line.split_whitespace();
            let _priority = columns.next()?;
            let lang = columns.next()?;
            let _age_gender = columns.next()?;
            let name = columns.next()?;
            Some(LocalVoice {
                name: name.to_string(),
                lang: lang.to_string(),
                local_service: true,
                is_default: false,
            })
        })
        .collect()
}
