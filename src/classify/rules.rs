use super::ActivityState;

/// One entry of the classifier table. Patterns are lowercase substrings
/// matched against normalized recognizer output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeywordRule {
    pub pattern: &'static str,
    pub target: ActivityState,
}

const fn rule(pattern: &'static str, target: ActivityState) -> KeywordRule {
    KeywordRule { pattern, target }
}

/// The classifier table. Distilled from the HUD phrases the game actually
/// renders; matching is by specificity (longest pattern wins), so the order
/// here only groups entries for readability.
pub const KEYWORD_RULES: &[KeywordRule] = &[
    // Completion banners. These fire from any active state.
    rule("mission passed", ActivityState::MissionComplete),
    rule("mission failed", ActivityState::MissionComplete),
    rule("job complete", ActivityState::MissionComplete),
    rule("contract complete", ActivityState::MissionComplete),
    rule("time ran out", ActivityState::MissionComplete),
    rule("product lost", ActivityState::MissionComplete),
    rule("wasted", ActivityState::MissionComplete),
    rule("busted", ActivityState::MissionComplete),
    // Sell missions.
    rule("deliver the product", ActivityState::Selling),
    rule("deliver the goods", ActivityState::Selling),
    rule("deliveries remaining", ActivityState::Selling),
    rule("delivery vehicle", ActivityState::Selling),
    rule("product value", ActivityState::Selling),
    rule("sell mission", ActivityState::Selling),
    rule("drop off", ActivityState::Selling),
    rule("buyer", ActivityState::Selling),
    // Heist preparation.
    rule("heist prep", ActivityState::HeistPrep),
    rule("heist setup", ActivityState::HeistPrep),
    rule("setup cost", ActivityState::HeistPrep),
    rule("scope out", ActivityState::HeistPrep),
    rule("prep work", ActivityState::HeistPrep),
    // Named freeroam work and generic objective verbs.
    rule("headhunter", ActivityState::MissionActive),
    rule("sightseer", ActivityState::MissionActive),
    rule("hostile takeover", ActivityState::MissionActive),
    rule("executive search", ActivityState::MissionActive),
    rule("asset recovery", ActivityState::MissionActive),
    rule("security contract", ActivityState::MissionActive),
    rule("payphone hit", ActivityState::MissionActive),
    rule("targets remaining", ActivityState::MissionActive),
    rule("heist finale", ActivityState::MissionActive),
    rule("go to", ActivityState::MissionActive),
    rule("lose the cops", ActivityState::MissionActive),
    rule("eliminate", ActivityState::MissionActive),
    rule("deliver", ActivityState::MissionActive),
    rule("steal", ActivityState::MissionActive),
    rule("collect", ActivityState::MissionActive),
    // Business laptop.
    rule("sell stock", ActivityState::BusinessComputer),
    rule("resupply", ActivityState::BusinessComputer),
    rule("supplies", ActivityState::BusinessComputer),
    rule("stock", ActivityState::BusinessComputer),
    rule("production", ActivityState::BusinessComputer),
    // Load screens occasionally keep their caption readable.
    rule("loading", ActivityState::Loading),
];

/// Outcome of matching a text against the rule table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleMatch {
    None,
    /// A single most specific rule won.
    Unique(KeywordRule),
    /// Several equally specific rules point at different states. The caller
    /// keeps its current state to avoid flapping.
    Ambiguous,
}

/// Finds the most specific rule whose pattern occurs in `text`.
/// `text` must already be lowercase.
pub fn best_match(rules: &[KeywordRule], text: &str) -> RuleMatch {
    let mut best: Option<KeywordRule> = None;
    let mut ambiguous = false;

    for rule in rules {
        if !text.contains(rule.pattern) {
            continue;
        }
        match best {
            None => best = Some(*rule),
            Some(current) if rule.pattern.len() > current.pattern.len() => {
                best = Some(*rule);
                ambiguous = false;
            }
            Some(current)
                if rule.pattern.len() == current.pattern.len()
                    && rule.target != current.target =>
            {
                ambiguous = true;
            }
            Some(_) => {}
        }
    }

    match best {
        Some(rule) if !ambiguous => RuleMatch::Unique(rule),
        Some(_) => RuleMatch::Ambiguous,
        None => RuleMatch::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_longest_pattern_wins() {
        let matched = best_match(KEYWORD_RULES, "deliver the product to the buyer");
        assert_eq!(
            matched,
            RuleMatch::Unique(rule("deliver the product", ActivityState::Selling))
        );
    }

    #[test]
    fn test_equal_length_conflict_is_ambiguous() {
        // "stock" and "steal" are both five characters with different targets.
        let matched = best_match(KEYWORD_RULES, "steal the stock");
        assert_eq!(matched, RuleMatch::Ambiguous);
    }

    #[test]
    fn test_no_keywords() {
        assert_eq!(best_match(KEYWORD_RULES, "just cruising around"), RuleMatch::None);
    }
}
