//! Skill tagging against a controlled vocabulary
//!
//! Maps free-text posting content to canonical skill names using a
//! data-driven pattern table. Matching is case-insensitive and word-boundary
//! aware, so "R" never matches inside "Director". Patterns may carry
//! multilingual synonyms that fold into one canonical name.

use crate::error::{JobTrackerError, Result};
use regex::RegexSetBuilder;

/// One vocabulary entry: canonical name plus its match pattern.
#[derive(Debug, Clone)]
pub struct SkillPattern {
    pub name: &'static str,
    pub pattern: &'static str,
}

pub struct SkillTagger {
    names: Vec<String>,
    matcher: regex::RegexSet,
}

impl SkillTagger {
    /// Build a tagger over the default vocabulary.
    pub fn new() -> Result<Self> {
        Self::with_vocabulary(default_vocabulary())
    }

    pub fn with_vocabulary(entries: Vec<SkillPattern>) -> Result<Self> {
        let names = entries.iter().map(|e| e.name.to_string()).collect();
        let patterns: Vec<&str> = entries.iter().map(|e| e.pattern).collect();

        let matcher = RegexSetBuilder::new(&patterns)
            .case_insensitive(true)
            .build()
            .map_err(|e| {
                JobTrackerError::Configuration(format!("Invalid skill pattern: {}", e))
            })?;

        Ok(Self { names, matcher })
    }

    /// Return every canonical skill whose pattern matches the text.
    ///
    /// Results come back in vocabulary order, so tagging is deterministic
    /// regardless of where in the text the matches occur. Empty or missing
    /// text yields an empty set.
    pub fn tag(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        // Collapse line breaks so patterns spanning spaces still match
        let flattened = text.replace(['\n', '\r'], " ");

        self.matcher
            .matches(&flattened)
            .into_iter()
            .map(|i| self.names[i].clone())
            .collect()
    }

    /// Combined posting text the tagger runs over.
    pub fn posting_text(title: &str, description: Option<&str>, role: &str) -> String {
        let mut parts = vec![title.to_string()];
        if let Some(desc) = description {
            parts.push(desc.to_string());
        }
        parts.push(role.to_string());
        parts.join(" ")
    }

    pub fn contains(&self, skill: &str) -> bool {
        self.names.iter().any(|n| n == skill)
    }
}

/// Canonical skill table. Patterns are matched case-insensitively with
/// word boundaries; alternations carry synonyms and French variants.
pub fn default_vocabulary() -> Vec<SkillPattern> {
    vec![
        // Languages
        SkillPattern { name: "Python", pattern: r"\bpython\b" },
        SkillPattern { name: "SQL", pattern: r"\bsql\b" },
        SkillPattern { name: "Java", pattern: r"\bjava\b" },
        SkillPattern { name: "JavaScript", pattern: r"\b(javascript|js)\b" },
        SkillPattern { name: "TypeScript", pattern: r"\btypescript\b" },
        SkillPattern { name: "C++", pattern: r"\bc\+\+" },
        SkillPattern { name: "C#", pattern: r"\b(c#|csharp)\b" },
        SkillPattern { name: "R", pattern: r"\br\b" },
        SkillPattern { name: "PHP", pattern: r"\bphp\b" },
        // "go" alone is too ambiguous in prose; require the explicit form
        SkillPattern { name: "Go", pattern: r"\bgolang\b" },
        SkillPattern { name: "VBA", pattern: r"\bvba\b" },
        // Frameworks & libraries
        SkillPattern { name: "React", pattern: r"\breact(\.js)?\b" },
        SkillPattern { name: "Angular", pattern: r"\bangular\b" },
        SkillPattern { name: "Vue.js", pattern: r"\bvue(\.js)?\b" },
        SkillPattern { name: "Spring Boot", pattern: r"\bspring\s?boot\b" },
        SkillPattern { name: "Django", pattern: r"\bdjango\b" },
        SkillPattern { name: "Flask", pattern: r"\bflask\b" },
        SkillPattern { name: "FastAPI", pattern: r"\bfastapi\b" },
        SkillPattern { name: "Pandas", pattern: r"\bpandas\b" },
        SkillPattern { name: "NumPy", pattern: r"\bnumpy\b" },
        SkillPattern { name: "Scikit-Learn", pattern: r"\b(scikit-learn|sklearn)\b" },
        SkillPattern { name: "TensorFlow", pattern: r"\btensorflow\b" },
        SkillPattern { name: "PyTorch", pattern: r"\bpytorch\b" },
        SkillPattern { name: "Spark", pattern: r"\bspark\b" },
        SkillPattern { name: "Hadoop", pattern: r"\bhadoop\b" },
        SkillPattern { name: "Airflow", pattern: r"\bairflow\b" },
        // Databases
        SkillPattern { name: "PostgreSQL", pattern: r"\b(postgresql|postgres)\b" },
        SkillPattern { name: "MySQL", pattern: r"\bmysql\b" },
        SkillPattern { name: "MongoDB", pattern: r"\bmongodb?\b" },
        SkillPattern { name: "Oracle", pattern: r"\boracle\b" },
        SkillPattern { name: "Redis", pattern: r"\bredis\b" },
        SkillPattern { name: "Elasticsearch", pattern: r"\belastic\s?search\b" },
        // Tools & platforms
        SkillPattern { name: "Docker", pattern: r"\bdocker\b" },
        SkillPattern { name: "Kubernetes", pattern: r"\b(kubernetes|k8s)\b" },
        SkillPattern { name: "AWS", pattern: r"\b(aws|amazon web services)\b" },
        SkillPattern { name: "Azure", pattern: r"\bazure\b" },
        SkillPattern { name: "GCP", pattern: r"\b(gcp|google cloud)\b" },
        SkillPattern { name: "Git", pattern: r"\bgit\b" },
        SkillPattern { name: "Jenkins", pattern: r"\bjenkins\b" },
        SkillPattern { name: "Terraform", pattern: r"\bterraform\b" },
        SkillPattern { name: "Snowflake", pattern: r"\bsnowflake\b" },
        SkillPattern { name: "Databricks", pattern: r"\bdatabricks\b" },
        // Visualization & BI
        SkillPattern { name: "Power BI", pattern: r"\bpower\s?bi\b" },
        SkillPattern { name: "Tableau", pattern: r"\btableau\b" },
        SkillPattern { name: "Excel", pattern: r"\bexcel\b" },
        // Concepts (English + French variants)
        SkillPattern {
            name: "Machine Learning",
            pattern: r"\b(machine learning|apprentissage automatique|ml)\b",
        },
        SkillPattern {
            name: "Deep Learning",
            pattern: r"\b(deep learning|apprentissage profond|dl)\b",
        },
        SkillPattern {
            name: "NLP",
            pattern: r"\b(nlp|natural language processing|traitement du langage naturel)\b",
        },
        SkillPattern { name: "Big Data", pattern: r"\b(big data|m[ée]gadonn[ée]es)\b" },
        SkillPattern { name: "DevOps", pattern: r"\bdevops\b" },
        SkillPattern { name: "Agile", pattern: r"\b(agile|scrum)\b" },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_tagging() {
        let tagger = SkillTagger::new().unwrap();
        let skills = tagger.tag("Looking for a Python developer with SQL and Docker experience");

        assert!(skills.contains(&"Python".to_string()));
        assert!(skills.contains(&"SQL".to_string()));
        assert!(skills.contains(&"Docker".to_string()));
        assert!(!skills.contains(&"Java".to_string()));
    }

    #[test]
    fn test_word_boundaries_prevent_partial_matches() {
        let tagger = SkillTagger::new().unwrap();

        // "R" must not match inside "Director"
        let skills = tagger.tag("Director of Engineering");
        assert!(!skills.contains(&"R".to_string()));

        let skills = tagger.tag("Experience with R and statistics");
        assert!(skills.contains(&"R".to_string()));

        // "Java" must not fire on "JavaScript" alone
        let skills = tagger.tag("JavaScript only");
        assert!(skills.contains(&"JavaScript".to_string()));
        assert!(!skills.contains(&"Java".to_string()));
    }

    #[test]
    fn test_case_insensitive() {
        let tagger = SkillTagger::new().unwrap();
        let upper = tagger.tag("PYTHON AND KUBERNETES");
        let lower = tagger.tag("python and kubernetes");
        assert_eq!(upper, lower);
        assert!(upper.contains(&"Kubernetes".to_string()));
    }

    #[test]
    fn test_multilingual_variants_fold_to_canonical() {
        let tagger = SkillTagger::new().unwrap();

        let english = tagger.tag("strong machine learning background");
        let french = tagger.tag("solide exp\u{e9}rience en apprentissage automatique");
        assert!(english.contains(&"Machine Learning".to_string()));
        assert!(french.contains(&"Machine Learning".to_string()));
    }

    #[test]
    fn test_synonyms_map_to_one_name() {
        let tagger = SkillTagger::new().unwrap();
        let skills = tagger.tag("We use k8s in production");
        assert!(skills.contains(&"Kubernetes".to_string()));
    }

    #[test]
    fn test_empty_text_yields_empty_set() {
        let tagger = SkillTagger::new().unwrap();
        assert!(tagger.tag("").is_empty());
        assert!(tagger.tag("   \n  ").is_empty());
    }

    #[test]
    fn test_tagging_is_idempotent_and_deterministic() {
        let tagger = SkillTagger::new().unwrap();
        let text = "Python, React and AWS. Also python again.";

        let first = tagger.tag(text);
        let second = tagger.tag(text);
        assert_eq!(first, second);

        // Duplicate mentions produce one entry
        assert_eq!(
            first.iter().filter(|s| s.as_str() == "Python").count(),
            1
        );
    }

    #[test]
    fn test_all_results_in_vocabulary() {
        let tagger = SkillTagger::new().unwrap();
        let skills =
            tagger.tag("Python sql react docker kubernetes terraform excel scrum big data");
        for skill in &skills {
            assert!(tagger.contains(skill), "{} not in vocabulary", skill);
        }
    }
}
