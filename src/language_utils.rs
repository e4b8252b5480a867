use anyhow::{Result, anyhow};
use isolang::Language;

/// Language utilities for text-detection language hints
///
/// The annotation service takes BCP-47 style hints ("zh", "ko", "zh-TW").
/// Users may type ISO 639-1 or ISO 639-2 codes; this module validates them
/// and normalizes the primary subtag to ISO 639-1 where one exists.

// ISO 639-2/B codes that differ from their 639-2/T form
fn part2b_to_part2t(code: &str) -> &str {
    match code {
        "fre" => "fra",
        "ger" => "deu",
        "dut" => "nld",
        "gre" => "ell",
        "chi" => "zho",
        "cze" => "ces",
        "ice" => "isl",
        "alb" => "sqi",
        "arm" => "hye",
        "baq" => "eus",
        "bur" => "mya",
        "per" => "fas",
        "geo" => "kat",
        "may" => "msa",
        "mac" => "mkd",
        "rum" => "ron",
        "slo" => "slk",
        "wel" => "cym",
        other => other,
    }
}

/// Resolve a bare ISO 639-1 / 639-2 code to a language
fn resolve(code: &str) -> Option<Language> {
    let normalized_code = code.trim().to_lowercase();

    match normalized_code.len() {
        2 => Language::from_639_1(&normalized_code),
        3 => Language::from_639_3(part2b_to_part2t(&normalized_code)),
        _ => None,
    }
}

/// Normalize a language code to ISO 639-1 (2-letter) format if possible
/// Falls back to ISO 639-2/T if no ISO 639-1 code exists
pub fn normalize_to_part1_or_part2t(code: &str) -> Result<String> {
    let lang = resolve(code)
        .ok_or_else(|| anyhow!("Cannot normalize invalid language code: {}", code))?;

    Ok(match lang.to_639_1() {
        Some(part1) => part1.to_string(),
        None => lang.to_639_3().to_string(),
    })
}

/// Normalize a language hint, keeping an optional region subtag
///
/// `"chi"` -> `"zh"`, `"zh_tw"` -> `"zh-TW"`, `"zh-hant"` -> `"zh-Hant"`, `"KOR"` -> `"ko"`.
pub fn normalize_language_hint(hint: &str) -> Result<String> {
    let trimmed = hint.trim();
    let mut parts = trimmed.splitn(2, ['-', '_']);
    let primary = parts.next().unwrap_or_default();
    let region = parts.next();

    let primary = normalize_to_part1_or_part2t(primary)
        .map_err(|_| anyhow!("Invalid language hint: {}", hint))?;

    match region {
        None => Ok(primary),
        Some(region) if (2..=3).contains(&region.len()) && region.chars().all(|c| c.is_ascii_alphanumeric()) => {
            Ok(format!("{}-{}", primary, region.to_uppercase()))
        }
        // Four letters is a script subtag, written in title case
        Some(script) if script.len() == 4 && script.chars().all(|c| c.is_ascii_alphabetic()) => {
            let (first, rest) = script.split_at(1);
            Ok(format!("{}-{}{}", primary, first.to_uppercase(), rest.to_lowercase()))
        }
        Some(_) => Err(anyhow!("Invalid region in language hint: {}", hint)),
    }
}

/// Get the English language name from a code
pub fn get_language_name(code: &str) -> Result<String> {
    let lang = resolve(code)
        .ok_or_else(|| anyhow!("Failed to get language from code: {}", code))?;

    Ok(lang.to_name().to_string())
}
