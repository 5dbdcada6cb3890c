//! Declarative detection rules shared by the risk detector and the
//! compliance scanner.
//!
//! A `RuleTable` is a set of regex rules compiled once at startup. Both
//! detectors run the same matching mechanics over a table; they differ only
//! in which table they load and how they fold matches into output rows.
//! A malformed pattern is a configuration error and fails table
//! construction; it can never surface per request.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Maximum sub-matches a single rule contributes per pass.
pub const MATCH_CAP: usize = 6;

// ---------------------------------------------------------------------------
// Severity
// ---------------------------------------------------------------------------

/// Rule severity. Ordering is Low < Medium < High.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// Severity weighting law shared by both detectors and the compliance
/// metrics.
pub fn severity_weight(severity: Severity) -> f64 {
    match severity {
        Severity::High => 1.0,
        Severity::Medium => 0.6,
        Severity::Low => 0.35,
    }
}

// ---------------------------------------------------------------------------
// Categories
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleCategory {
    Privacy,
    Safety,
    Legal,
    Bias,
    Policy,
    Custom(String),
}

impl RuleCategory {
    /// Stable key for metric maps and output payloads.
    pub fn key(&self) -> &str {
        match self {
            RuleCategory::Privacy => "privacy",
            RuleCategory::Safety => "safety",
            RuleCategory::Legal => "legal",
            RuleCategory::Bias => "bias",
            RuleCategory::Policy => "policy",
            RuleCategory::Custom(name) => name,
        }
    }
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// A declarative detection rule. Patterns match against NFKC-normalized,
/// lower-cased text, so they are written in lowercase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub pattern: String,
    pub category: RuleCategory,
    pub severity: Severity,
    pub guidance: String,
    #[serde(default)]
    pub references: Vec<String>,
}

/// A rule with its compiled pattern.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub rule: Rule,
    regex: Regex,
}

/// One rule's matches within a single pass.
#[derive(Debug, Clone)]
pub struct RuleMatches<'a> {
    pub rule: &'a Rule,
    /// Matched text fragments, capped at [`MATCH_CAP`].
    pub fragments: Vec<String>,
}

/// An immutable set of compiled rules, loaded at startup.
#[derive(Debug, Clone)]
pub struct RuleTable {
    rules: Vec<CompiledRule>,
}

impl RuleTable {
    /// Compile a rule set. The first malformed pattern fails the whole
    /// table; detection never runs against a partially valid set.
    pub fn new(rules: Vec<Rule>) -> Result<Self, EngineError> {
        let mut compiled = Vec::with_capacity(rules.len());
        for rule in rules {
            let regex = Regex::new(&rule.pattern).map_err(|e| EngineError::InvalidRulePattern {
                rule_id: rule.id.clone(),
                message: e.to_string(),
            })?;
            compiled.push(CompiledRule { rule, regex });
        }
        Ok(Self { rules: compiled })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter().map(|c| &c.rule)
    }

    /// Run every rule against already-normalized text. Returns one entry
    /// per rule that matched, with up to [`MATCH_CAP`] fragments each.
    pub fn find_matches<'a>(&'a self, normalized_text: &str) -> Vec<RuleMatches<'a>> {
        let mut results = Vec::new();
        for compiled in &self.rules {
            let fragments: Vec<String> = compiled
                .regex
                .find_iter(normalized_text)
                .take(MATCH_CAP)
                .map(|m| m.as_str().to_string())
                .collect();
            if !fragments.is_empty() {
                results.push(RuleMatches {
                    rule: &compiled.rule,
                    fragments,
                });
            }
        }
        results
    }
}

// ---------------------------------------------------------------------------
// Built-in tables
// ---------------------------------------------------------------------------

fn rule(
    id: &str,
    pattern: &str,
    category: RuleCategory,
    severity: Severity,
    guidance: &str,
    references: &[&str],
) -> Rule {
    Rule {
        id: id.to_string(),
        pattern: pattern.to_string(),
        category,
        severity,
        guidance: guidance.to_string(),
        references: references.iter().map(|s| s.to_string()).collect(),
    }
}

/// Risk signals detected in intake conversations.
pub fn risk_rules() -> Result<RuleTable, EngineError> {
    use RuleCategory::*;
    use Severity::*;

    RuleTable::new(vec![
        rule(
            "violence-threat",
            r"협박|위협|죽이(겠|려|고)|해치(겠|려)|폭행|보복|threat(en(ed|ing)?)?|kill you|hurt you",
            Safety,
            High,
            "Document every threat verbatim with timestamps and advise contacting police if danger is immediate.",
            &["safety-escalation"],
        ),
        rule(
            "legal-deadline",
            r"기한|마감|소멸시효|출석\s?요구|내용증명|deadline|statute of limitations|summons|court date",
            Legal,
            High,
            "Confirm the exact date and consult counsel before the window closes.",
            &["legal-referral"],
        ),
        rule(
            "stalking-pattern",
            r"스토킹|미행\s?당|따라다니|집\s?앞에|stalk(er|ing)?|following me|showed up at my",
            Safety,
            High,
            "Preserve logs of each incident and consider a protective order.",
            &["safety-escalation"],
        ),
        rule(
            "self-harm-risk",
            r"자해|자살|극단적\s?선택|self[- ]?harm|suicide",
            Safety,
            High,
            "Pause intake automation and route to a human operator immediately.",
            &["crisis-protocol"],
        ),
        rule(
            "financial-fraud",
            r"사기|먹튀|편취|투자금.{0,8}(잠적|사라)|차용증|fraud|scam|ponzi|embezzle",
            Legal,
            Medium,
            "Collect transfer records, contracts, and counterpart identity details.",
            &["evidence-checklist"],
        ),
        rule(
            "privacy-exposure",
            r"유출|신상\s?공개|몰카|도용|사진.{0,8}퍼지|leak(ed)?|doxx(ed|ing)?|identity theft|revenge",
            Privacy,
            Medium,
            "Capture where the material appeared before requesting takedowns.",
            &["evidence-checklist"],
        ),
        rule(
            "evidence-destruction",
            r"증거\s?인멸|지워버|삭제(했|하려)|기록을\s?없애|destroy(ed)? evidence|wiped the",
            Legal,
            Medium,
            "Secure remaining copies now; recovery narrows quickly.",
            &["evidence-checklist"],
        ),
        rule(
            "missing-contact",
            r"실종|연락\s?두절|잠적|가출|행방불명|missing person|disappeared|no contact for",
            Safety,
            Medium,
            "Establish the last confirmed sighting and known routine first.",
            &["trace-protocol"],
        ),
        rule(
            "repeated-harassment",
            r"괴롭힘|폭언|욕설.{0,6}반복|계속\s?연락|harass(ment|ing)?|won'?t stop (calling|texting)",
            Safety,
            Medium,
            "Build a dated incident log; frequency is the strongest evidence.",
            &["evidence-checklist"],
        ),
        rule(
            "debt-evasion",
            r"돈을?\s?(안|못)\s?갚|빌려줬|채무|차일피일|변제|owes? me|refus(es|ing) to pay|lent",
            Policy,
            Low,
            "Gather the loan agreement and any partial-payment history.",
            &["asset-trace"],
        ),
    ])
}

/// Compliance issues scanned in drafted text (report drafts, negotiation
/// scripts, conversation summaries).
pub fn compliance_rules() -> Result<RuleTable, EngineError> {
    use RuleCategory::*;
    use Severity::*;

    RuleTable::new(vec![
        rule(
            "resident-id-exposure",
            r"주민\s?등록\s?번호|\b\d{6}-\d{7}\b",
            Privacy,
            High,
            "Redact resident registration numbers before the text leaves the system.",
            &["pipa"],
        ),
        rule(
            "phone-number-exposure",
            r"\b01\d-?\d{3,4}-?\d{4}\b|전화\s?번호.{0,12}\d{3}",
            Privacy,
            Medium,
            "Mask phone numbers unless the recipient is authorized to see them.",
            &["pipa"],
        ),
        rule(
            "location-tracking",
            r"위치\s?추적|gps\s?(추적|부착)|차량에\s?몰래|track (his|her|their) (location|car)|gps tracker",
            Legal,
            High,
            "Location tracking without consent is a criminal offense; remove the request.",
            &["location-info-act"],
        ),
        rule(
            "wiretap-interception",
            r"도청|감청|몰래\s?녹음|통화\s?내용을\s?몰래|wiretap|hidden (mic|microphone|recorder)",
            Legal,
            High,
            "Third-party interception is illegal regardless of motive; decline and restate lawful options.",
            &["protection-of-communications-act"],
        ),
        rule(
            "unauthorized-access",
            r"해킹|비밀번호를?\s?(알아|풀어)|계정에?\s?몰래|메시지를?\s?몰래\s?(봐|확인)|hack(ing)? into|break into (his|her|their) (account|phone)",
            Legal,
            High,
            "Account intrusion cannot be offered as a service; flag for operator review.",
            &["network-act"],
        ),
        rule(
            "violence-solicitation",
            r"손\s?좀\s?봐|혼내\s?(주|줄)|폭력|때려|rough (him|her) up|teach (him|her) a lesson|beat (him|her)",
            Safety,
            High,
            "Any request for physical retaliation ends the engagement; do not negotiate terms.",
            &["safety-escalation"],
        ),
        rule(
            "discriminatory-language",
            r"외국인이라서?|여자라서?|남자라서?|그런\s?사람들은|because (he|she)'?s (a|an)\s|those people",
            Bias,
            Medium,
            "Rephrase profiling language into observed behavior before it reaches a report.",
            &["style-guide"],
        ),
        rule(
            "guaranteed-outcome",
            r"100%\s?(보장|성공)|무조건\s?성공|확실히\s?잡아|guaranteed? (result|success)|100% success",
            Policy,
            Medium,
            "Remove outcome guarantees; investigations are best-effort by contract.",
            &["service-terms"],
        ),
        rule(
            "upfront-full-payment",
            r"전액\s?선(입금|불)|선불로\s?전액|full (payment|fee) upfront|wire the full",
            Policy,
            Low,
            "Escrowed milestone payments only; full prepayment is a marketplace violation.",
            &["service-terms"],
        ),
        rule(
            "minor-involved",
            r"미성년자?|청소년|중학생|고등학생|minor|underage|high school(er)?",
            Safety,
            High,
            "Cases involving minors require the guardian-consent workflow before any field work.",
            &["minors-protocol"],
        ),
    ])
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::normalize_text;

    #[test]
    fn test_malformed_pattern_is_fatal() {
        let result = RuleTable::new(vec![rule(
            "broken",
            r"(unclosed",
            RuleCategory::Safety,
            Severity::Low,
            "",
            &[],
        )]);
        match result {
            Err(EngineError::InvalidRulePattern { rule_id, .. }) => {
                assert_eq!(rule_id, "broken");
            }
            other => panic!("expected InvalidRulePattern, got {:?}", other.map(|t| t.len())),
        }
    }

    #[test]
    fn test_severity_weight_ordering() {
        assert!(severity_weight(Severity::High) > severity_weight(Severity::Medium));
        assert!(severity_weight(Severity::Medium) > severity_weight(Severity::Low));
    }

    #[test]
    fn test_severity_ord() {
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
    }

    #[test]
    fn test_builtin_tables_compile() {
        assert!(!risk_rules().expect("risk table").is_empty());
        assert!(!compliance_rules().expect("compliance table").is_empty());
    }

    #[test]
    fn test_match_cap_applies_per_rule() {
        let table = RuleTable::new(vec![rule(
            "repeat",
            r"spam",
            RuleCategory::Policy,
            Severity::Low,
            "",
            &[],
        )])
        .expect("table");

        let text = "spam ".repeat(20);
        let matches = table.find_matches(&normalize_text(&text));
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].fragments.len(), MATCH_CAP);
    }

    #[test]
    fn test_korean_threat_and_deadline_match() {
        let table = risk_rules().expect("table");
        let text = normalize_text("협박 문자를 받았고 다음 주가 기한입니다");
        let matches = table.find_matches(&text);
        let ids: Vec<&str> = matches.iter().map(|m| m.rule.id.as_str()).collect();
        assert!(ids.contains(&"violence-threat"));
        assert!(ids.contains(&"legal-deadline"));
    }

    #[test]
    fn test_resident_id_digit_pattern() {
        let table = compliance_rules().expect("table");
        let text = normalize_text("고객 주민번호는 900101-1234567 입니다");
        let matches = table.find_matches(&text);
        assert!(matches.iter().any(|m| m.rule.id == "resident-id-exposure"));
    }

    #[test]
    fn test_category_keys() {
        assert_eq!(RuleCategory::Privacy.key(), "privacy");
        assert_eq!(RuleCategory::Custom("field".to_string()).key(), "field");
    }
}
