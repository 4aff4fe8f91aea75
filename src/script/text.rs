// script/text.rs
//
// Round-trip-stable UTF-8 text format for scripts. Field contents are
// escaped before emission so the separators stay unambiguous; the inverse
// mapping is applied on read.

use std::io::{BufRead, Write};

use anyhow::{bail, Context, Result};

use crate::script::types::{
    Argument, Entity, Event, Mention, NerTag, Predicate, Script, Token,
};

pub const DOC_SEPARATOR: &str = "###DOC###";

// Order matters on escape: the space-slash-slash-space sequence must be
// consumed before single slashes are.
const ESCAPES: &[(&str, &str)] = &[
    (" // ", "@slashes@"),
    ("/", "@slash@"),
    (":", "@colon@"),
    (",", "@comma@"),
    (";", "@semicolon@"),
    ("-", "@dash@"),
    ("_", "@underscore@"),
];

pub fn escape(s: &str) -> String {
    let mut out = s.to_string();
    for (lit, esc) in ESCAPES {
        out = out.replace(lit, esc);
    }
    out
}

pub fn unescape(s: &str) -> String {
    let mut out = s.to_string();
    for (lit, esc) in ESCAPES {
        out = out.replace(esc, lit);
    }
    out
}

fn ner_str(ner: Option<NerTag>) -> &'static str {
    ner.map(|t| t.as_str()).unwrap_or("O")
}

fn parse_ner(s: &str) -> Option<NerTag> {
    NerTag::parse(s)
}

/* --------------------- emission --------------------- */

fn emit_mention(m: &Mention) -> String {
    let mut fields = vec![
        m.sent.to_string(),
        m.start.to_string(),
        m.end.to_string(),
        m.head.to_string(),
        if m.representative { "1".into() } else { "0".into() },
        ner_str(m.ner).to_string(),
    ];
    fields.extend(m.tokens.iter().map(|t| escape(t)));
    fields.join(":")
}

fn emit_predicate(p: &Predicate) -> String {
    let mut out = String::new();
    if p.negated {
        out.push_str("not//");
    }
    out.push_str(&format!(
        "{}/{}/{}",
        escape(&p.token.word),
        escape(&p.token.lemma),
        escape(&p.token.pos)
    ));
    if let Some(prt) = &p.prt {
        out.push_str(&format!("//{}", escape(prt)));
    }
    out
}

fn emit_argument(a: &Argument) -> String {
    let mut out = format!(
        "{}/{}/{}/{}",
        escape(&a.token.word),
        escape(&a.token.lemma),
        escape(&a.token.pos),
        ner_str(a.token.ner)
    );
    if a.entity_idx >= 0 {
        out.push_str(&format!("//entity-{}-{}", a.entity_idx, a.mention_idx));
    }
    out
}

fn emit_event(e: &Event) -> String {
    let mut out = emit_predicate(&e.predicate);
    out.push_str(" :SUBJ: ");
    match &e.subject {
        Some(a) => out.push_str(&emit_argument(a)),
        None => out.push_str("NONE"),
    }
    out.push_str(" :OBJ: ");
    match &e.object {
        Some(a) => out.push_str(&emit_argument(a)),
        None => out.push_str("NONE"),
    }
    for (prep, arg) in &e.pobjs {
        out.push_str(&format!(" :POBJ: {} : {}", escape(prep), emit_argument(arg)));
    }
    out
}

pub fn emit_script(s: &Script) -> String {
    let mut out = String::new();
    out.push_str(&s.name);
    out.push_str("\n\nEntities:\n");
    for (i, entity) in s.entities.iter().enumerate() {
        let mentions: Vec<String> = entity.mentions.iter().map(emit_mention).collect();
        out.push_str(&format!("entity-{:03}\t{}\n", i, mentions.join(" :: ")));
    }
    out.push_str("\nEvents:\n");
    for (i, event) in s.events.iter().enumerate() {
        out.push_str(&format!("event-{:04}\t{}\n", i, emit_event(event)));
    }
    out
}

/// Writes a multi-document corpus, documents separated by `###DOC###`.
pub fn write_corpus<W: Write>(w: &mut W, scripts: &[Script]) -> Result<()> {
    for (i, s) in scripts.iter().enumerate() {
        if i > 0 {
            writeln!(w, "{}", DOC_SEPARATOR)?;
        }
        w.write_all(emit_script(s).as_bytes())?;
    }
    Ok(())
}

/* ---------------------- parsing ---------------------- */

fn parse_mention(s: &str) -> Result<Mention> {
    let fields: Vec<&str> = s.split(':').collect();
    if fields.len() < 7 {
        bail!("mention '{}' has {} fields, expected at least 7", s, fields.len());
    }
    let sent = fields[0].parse().with_context(|| format!("mention sent in '{}'", s))?;
    let start = fields[1].parse().with_context(|| format!("mention start in '{}'", s))?;
    let end = fields[2].parse().with_context(|| format!("mention end in '{}'", s))?;
    let head = fields[3].parse().with_context(|| format!("mention head in '{}'", s))?;
    let representative = match fields[4] {
        "1" => true,
        "0" => false,
        other => bail!("mention rep flag '{}' in '{}'", other, s),
    };
    let ner = parse_ner(fields[5]);
    let tokens = fields[6..].iter().map(|t| unescape(t)).collect();
    let m = Mention { sent, start, end, head, representative, ner, tokens };
    m.validate()?;
    Ok(m)
}

fn parse_predicate(s: &str) -> Result<Predicate> {
    let (negated, rest) = match s.strip_prefix("not//") {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let (core, prt) = match rest.split_once("//") {
        Some((core, prt)) => (core, Some(unescape(prt))),
        None => (rest, None),
    };
    let parts: Vec<&str> = core.split('/').collect();
    if parts.len() != 3 {
        bail!("predicate '{}' does not have word/lemma/pos form", s);
    }
    Ok(Predicate {
        token: Token::new(&unescape(parts[0]), &unescape(parts[1]), &unescape(parts[2]), None),
        negated,
        prt,
    })
}

fn parse_argument(s: &str) -> Result<Argument> {
    let (core, link) = match s.split_once("//") {
        Some((core, link)) => (core, Some(link)),
        None => (s, None),
    };
    let parts: Vec<&str> = core.split('/').collect();
    if parts.len() != 4 {
        bail!("argument '{}' does not have word/lemma/pos/ner form", s);
    }
    let token = Token::new(
        &unescape(parts[0]),
        &unescape(parts[1]),
        &unescape(parts[2]),
        parse_ner(parts[3]),
    );
    let (entity_idx, mention_idx) = match link {
        Some(link) => {
            let rest = link
                .strip_prefix("entity-")
                .with_context(|| format!("argument link '{}' missing entity- prefix", link))?;
            let (e, m) = rest
                .split_once('-')
                .with_context(|| format!("argument link '{}' missing mention index", link))?;
            (
                e.parse().with_context(|| format!("entity index in '{}'", link))?,
                m.parse().with_context(|| format!("mention index in '{}'", link))?,
            )
        }
        None => (-1, -1),
    };
    Ok(Argument { token, entity_idx, mention_idx })
}

fn parse_arg_or_none(s: &str) -> Result<Option<Argument>> {
    if s == "NONE" {
        Ok(None)
    } else {
        parse_argument(s).map(Some)
    }
}

fn parse_event(s: &str) -> Result<Event> {
    let (pred_str, rest) = s
        .split_once(" :SUBJ: ")
        .with_context(|| format!("event '{}' missing :SUBJ: marker", s))?;
    let (subj_str, rest) = rest
        .split_once(" :OBJ: ")
        .with_context(|| format!("event '{}' missing :OBJ: marker", s))?;

    let mut pobjs = Vec::new();
    let mut segments = rest.split(" :POBJ: ");
    let obj_str = segments.next().unwrap_or("NONE");
    for seg in segments {
        let (prep, arg) = seg
            .split_once(" : ")
            .with_context(|| format!("pobj segment '{}' missing preposition separator", seg))?;
        pobjs.push((unescape(prep), parse_argument(arg)?));
    }

    let event = Event {
        predicate: parse_predicate(pred_str)?,
        subject: parse_arg_or_none(subj_str)?,
        object: parse_arg_or_none(obj_str)?,
        pobjs,
    };
    event.validate()?;
    Ok(event)
}

/// Parses one document's text into a script. Fails on the first malformed
/// item; the caller decides whether to skip the document or abort.
pub fn parse_script(text: &str) -> Result<Script> {
    let mut lines = text.lines();
    let name = loop {
        match lines.next() {
            Some(l) if l.trim().is_empty() => continue,
            Some(l) => break l.to_string(),
            None => bail!("empty script text"),
        }
    };

    enum Section {
        Preamble,
        Entities,
        Events,
    }
    let mut section = Section::Preamble;
    let mut entities = Vec::new();
    let mut events = Vec::new();
    let mut saw_entities = false;
    let mut saw_events = false;

    for line in lines {
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }
        match line {
            "Entities:" => {
                saw_entities = true;
                section = Section::Entities;
                continue;
            }
            "Events:" => {
                saw_events = true;
                section = Section::Events;
                continue;
            }
            _ => {}
        }
        match section {
            Section::Preamble => bail!("unexpected line before Entities: '{}'", line),
            Section::Entities => {
                let (id, body) = line
                    .split_once('\t')
                    .with_context(|| format!("entity line '{}' missing tab", line))?;
                if !id.starts_with("entity-") {
                    bail!("entity line id '{}' missing entity- prefix", id);
                }
                let mentions = body
                    .split(" :: ")
                    .map(parse_mention)
                    .collect::<Result<Vec<_>>>()?;
                let entity = Entity { mentions };
                entity.validate()?;
                entities.push(entity);
            }
            Section::Events => {
                let (id, body) = line
                    .split_once('\t')
                    .with_context(|| format!("event line '{}' missing tab", line))?;
                if !id.starts_with("event-") {
                    bail!("event line id '{}' missing event- prefix", id);
                }
                events.push(parse_event(body)?);
            }
        }
    }

    if !saw_entities || !saw_events {
        bail!("script '{}' missing Entities: or Events: section header", name);
    }

    let script = Script { name, entities, events };
    script.validate()?;
    Ok(script)
}

/// Reads a multi-document corpus, one script per `###DOC###`-separated block.
pub fn read_corpus<R: BufRead>(r: R) -> Result<Vec<Script>> {
    let mut scripts = Vec::new();
    let mut block = String::new();
    for line in r.lines() {
        let line = line?;
        if line.trim() == DOC_SEPARATOR {
            if !block.trim().is_empty() {
                scripts.push(parse_script(&block)?);
            }
            block.clear();
        } else {
            block.push_str(&line);
            block.push('\n');
        }
    }
    if !block.trim().is_empty() {
        scripts.push(parse_script(&block)?);
    }
    Ok(scripts)
}
