use event_comp::script::text::{escape, parse_script, unescape};
use event_comp::script::{emit_script, read_corpus, write_corpus};
use event_comp::script::{
    Argument, Entity, Event, Mention, NerTag, Predicate, Script, Token,
};

fn mention(sent: usize, start: usize, end: usize, head: usize, rep: bool, ner: Option<NerTag>, tokens: &[&str]) -> Mention {
    Mention {
        sent,
        start,
        end,
        head,
        representative: rep,
        ner,
        tokens: tokens.iter().map(|s| s.to_string()).collect(),
    }
}

fn sample_script() -> Script {
    let alice = Entity {
        mentions: vec![
            mention(0, 0, 1, 0, true, Some(NerTag::Per), &["Alice"]),
            mention(2, 3, 4, 3, false, None, &["she"]),
        ],
    };
    let bob = Entity {
        mentions: vec![mention(0, 5, 6, 5, true, Some(NerTag::Per), &["Bob"])],
    };
    let event = Event {
        predicate: Predicate {
            token: Token::new("bought", "buy", "VBD", None),
            negated: false,
            prt: None,
        },
        subject: Some(Argument::linked(Token::new("Alice", "alice", "NNP", Some(NerTag::Per)), 0, 0)),
        object: Some(Argument::unlinked(Token::new("book", "book", "NN", None))),
        pobjs: vec![(
            "from".to_string(),
            Argument::linked(Token::new("Bob", "bob", "NNP", Some(NerTag::Per)), 1, 0),
        )],
    };
    Script {
        name: "doc-001".to_string(),
        entities: vec![alice, bob],
        events: vec![event],
    }
}

#[test]
fn escape_round_trips_separator_characters() {
    for s in ["a/b", "a:b", "a,b", "x // y", "semi;colon", "multi-word", "under_score", "3:30-4:00"] {
        let escaped = escape(s);
        assert!(!escaped.contains('/'), "escaped form of '{}' still has a slash: {}", s, escaped);
        assert!(!escaped.contains(':'));
        assert!(!escaped.contains(','));
        assert_eq!(unescape(&escaped), s);
    }
}

#[test]
fn script_round_trips_through_text() {
    let script = sample_script();
    let text = emit_script(&script);
    let back = parse_script(&text).unwrap();
    assert_eq!(back, script);
}

#[test]
fn tokens_with_literal_separators_survive() {
    let mut script = sample_script();
    // Surface forms that collide with every separator the format uses.
    script.events[0].object = Some(Argument::unlinked(Token::new(
        "AT&T // Bell",
        "at&t_bell",
        "NNP",
        Some(NerTag::Org),
    )));
    script.events[0].pobjs[0].0 = "out_of".to_string();
    script.entities[0].mentions[0].tokens = vec!["Dr.".to_string(), "Smith-Jones".to_string()];
    script.entities[0].mentions[0].end = 2;
    let back = parse_script(&emit_script(&script)).unwrap();
    assert_eq!(back, script);
}

#[test]
fn negation_and_particle_round_trip() {
    let mut script = sample_script();
    script.events[0].predicate.negated = true;
    script.events[0].predicate.prt = Some("up".to_string());
    let back = parse_script(&emit_script(&script)).unwrap();
    assert!(back.events[0].predicate.negated);
    assert_eq!(back.events[0].predicate.prt.as_deref(), Some("up"));
    assert_eq!(back.events[0].predicate.core(), "buy_up");
}

#[test]
fn missing_subject_emits_none_marker() {
    let mut script = sample_script();
    script.events[0].subject = None;
    let text = emit_script(&script);
    assert!(text.contains(":SUBJ: NONE"));
    let back = parse_script(&text).unwrap();
    assert!(back.events[0].subject.is_none());
    assert!(back.events[0].object.is_some());
}

#[test]
fn corpus_round_trips_multiple_documents() {
    let mut second = sample_script();
    second.name = "doc-002".to_string();
    let scripts = vec![sample_script(), second];

    let mut buf = Vec::new();
    write_corpus(&mut buf, &scripts).unwrap();
    let back = read_corpus(buf.as_slice()).unwrap();
    assert_eq!(back, scripts);
}

#[test]
fn malformed_event_line_fails_loud() {
    let text = "doc\n\nEntities:\n\nEvents:\nevent-0000\tbroken line without markers\n";
    assert!(parse_script(text).is_err());
}

#[test]
fn out_of_range_entity_reference_is_rejected() {
    let mut script = sample_script();
    script.events[0].subject = Some(Argument::linked(
        Token::new("Alice", "alice", "NNP", None),
        7,
        0,
    ));
    let text = emit_script(&script);
    assert!(parse_script(&text).is_err());
}

#[test]
fn missing_section_headers_are_rejected() {
    assert!(parse_script("doc\n\nEvents:\n").is_err());
    assert!(parse_script("doc\n\nEntities:\n").is_err());
}
