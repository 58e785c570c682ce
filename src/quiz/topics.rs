use std::fmt;

use super::Difficulty;

/// Marker the completion service replaces with real text.
pub const BLANK_MARKER: &str = "<BLANK>";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Topic {
    Article,
    SubjectVerbAgreement,
    Tense,
    Preposition,
    Comparative,
    WhQuestion,
}

impl Topic {
    pub const ALL: [Topic; 6] = [
        Topic::Article,
        Topic::SubjectVerbAgreement,
        Topic::Tense,
        Topic::Preposition,
        Topic::Comparative,
        Topic::WhQuestion,
    ];

    /// Practised when the learner has no recognised weakness.
    pub const DEFAULT_WEAK: [Topic; 2] = [Topic::Article, Topic::SubjectVerbAgreement];

    pub fn label(&self) -> &'static str {
        match self {
            Topic::Article => "article",
            Topic::SubjectVerbAgreement => "subject-verb-agreement",
            Topic::Tense => "tense",
            Topic::Preposition => "preposition",
            Topic::Comparative => "comparative",
            Topic::WhQuestion => "wh-question",
        }
    }

    /// Matches free-form labels coming out of the conversation summary,
    /// e.g. "Articles", "sva", "subject verb agreement", "wh_question".
    pub fn from_label(label: &str) -> Option<Topic> {
        let normalized = label
            .trim()
            .to_lowercase()
            .replace(['_', ' '], "-");
        match normalized.as_str() {
            "article" | "articles" => Some(Topic::Article),
            "sva" | "subject-verb-agreement" | "agreement" => Some(Topic::SubjectVerbAgreement),
            "tense" | "tenses" | "verb-tense" => Some(Topic::Tense),
            "preposition" | "prepositions" => Some(Topic::Preposition),
            "comparative" | "comparatives" => Some(Topic::Comparative),
            "wh" | "wh-question" | "wh-questions" => Some(Topic::WhQuestion),
            _ => None,
        }
    }

    /// Words the answer must come from. Also the source of distractors.
    pub fn word_pool(&self) -> &'static [&'static str] {
        match self {
            Topic::Article => &["a", "an", "the"],
            Topic::SubjectVerbAgreement => &["is", "are", "was", "were", "has", "have"],
            Topic::Tense => &["go", "goes", "went", "gone"],
            Topic::Preposition => &["in", "on", "at", "to", "for", "from"],
            Topic::Comparative => &["more", "less", "better", "worse"],
            Topic::WhQuestion => &["who", "what", "where", "when", "why", "how"],
        }
    }

    /// Case-insensitive lookup into the pool, returns the pool's spelling.
    pub fn pool_word(&self, word: &str) -> Option<&'static str> {
        self.word_pool()
            .iter()
            .copied()
            .find(|w| w.eq_ignore_ascii_case(word))
    }

    pub fn skeletons(&self, difficulty: Difficulty) -> &'static [&'static str] {
        use Difficulty::*;
        match (self, difficulty) {
            (Topic::Article, Basic) => &[
                "I bought <BLANK> apple.",
                "She saw <BLANK> elephant.",
                "He needs <BLANK> umbrella.",
            ],
            (Topic::Article, Intermediate) => &[
                "I bought <BLANK> interesting book yesterday.",
                "She found <BLANK> old painting in the attic.",
                "They visited <BLANK> historical site during their trip.",
            ],
            (Topic::Article, Advanced) => &[
                "After hours of searching, she finally discovered <BLANK> unique artifact hidden beneath the ruins.",
                "He adopted <BLANK> abandoned dog that had been wandering around the neighborhood.",
                "Researchers published <BLANK> article detailing the results of the experiment.",
            ],
            (Topic::SubjectVerbAgreement, Basic) => &[
                "The students <BLANK> late.",
                "My friends <BLANK> here.",
                "The dog <BLANK> loud.",
            ],
            (Topic::SubjectVerbAgreement, Intermediate) => &[
                "The students <BLANK> always late for class.",
                "My friends <BLANK> going to the festival this weekend.",
                "The dogs <BLANK> barking loudly every night.",
            ],
            (Topic::SubjectVerbAgreement, Advanced) => &[
                "The committee <BLANK> deciding whether to approve the new policy.",
                "The data <BLANK> showing a significant improvement in performance.",
                "Neither the teacher nor the students <BLANK> aware of the schedule change.",
            ],
            (Topic::Tense, Basic) => &[
                "Tom <BLANK> to school yesterday.",
                "She <BLANK> home early.",
                "I <BLANK> to the park every day.",
            ],
            (Topic::Tense, Intermediate) => &[
                "She <BLANK> to the office before the meeting started.",
                "They have already <BLANK> to the station.",
                "He usually <BLANK> to the gym after work.",
            ],
            (Topic::Tense, Advanced) => &[
                "By the time I arrived, they had <BLANK> to the conference hall.",
                "Every summer she <BLANK> abroad to improve her language skills.",
                "Last year the whole team <BLANK> to the championship despite the injuries.",
            ],
            (Topic::Preposition, Basic) => &[
                "She arrived <BLANK> the airport.",
                "He sat <BLANK> the chair.",
                "The keys are <BLANK> the table.",
            ],
            (Topic::Preposition, Intermediate) => &[
                "We will meet <BLANK> 7 PM.",
                "He works <BLANK> a tech company.",
                "The picture is <BLANK> the wall.",
            ],
            (Topic::Preposition, Advanced) => &[
                "She succeeded <BLANK> completing the task despite the difficulties.",
                "He insisted <BLANK> joining the meeting even though he was sick.",
                "They participated <BLANK> the event held downtown.",
            ],
            (Topic::Comparative, Basic) => &[
                "This laptop is <BLANK> powerful.",
                "She is <BLANK> tall.",
                "My score is <BLANK> good.",
            ],
            (Topic::Comparative, Intermediate) => &[
                "This laptop is <BLANK> powerful than that one.",
                "She is <BLANK> skilled than John.",
                "The new phone is <BLANK> expensive than the old one.",
            ],
            (Topic::Comparative, Advanced) => &[
                "His explanation was <BLANK> clear than the previous one despite the complexity.",
                "The revised design is <BLANK> efficient compared with earlier models.",
                "Her performance was <BLANK> impressive considering the limited time.",
            ],
            (Topic::WhQuestion, Basic) => &[
                "<BLANK> is your name?",
                "<BLANK> are you?",
                "<BLANK> is he?",
            ],
            (Topic::WhQuestion, Intermediate) => &[
                "<BLANK> is your favorite subject?",
                "<BLANK> did you meet yesterday?",
                "<BLANK> do you usually wake up?",
            ],
            (Topic::WhQuestion, Advanced) => &[
                "<BLANK> did the factors influence the outcome of the experiment?",
                "<BLANK> did she reject the proposal so quickly?",
                "<BLANK> circumstances led to the unexpected result?",
            ],
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Every pool word across every topic, deduplicated, in topic order.
pub fn all_pool_words() -> Vec<&'static str> {
    let mut words: Vec<&'static str> = Vec::new();
    for topic in Topic::ALL {
        for word in topic.word_pool() {
            if !words.contains(word) {
                words.push(word);
            }
        }
    }
    words
}
