//! Datalog query and rule builder for the host store.
//!
//! A shell query pulls only the page entity. A content query pulls every
//! node reachable from the page through a `linker` rule whose clauses are
//! chosen by the two follow directives:
//!
//! | Directive | Clause added |
//! |-----------|--------------|
//! | `Shallow` | proximate `[?a :block/<rel> ?b]` |
//! | `Deep` | proximate + inductive `[?proximate_linker :block/<rel> ?b]` |
//! | `DontFollow` | none |

use crate::models::FollowLinksDirective;

/// True when neither relation is followed, i.e. only the page is pulled.
pub fn is_shell(follow_children: FollowLinksDirective, follow_refs: FollowLinksDirective) -> bool {
    follow_children == FollowLinksDirective::DontFollow
        && follow_refs == FollowLinksDirective::DontFollow
}

/// The `:find`/`:in`/`:where` query. Inputs are the page title and the rule
/// set from [`build_rules`].
pub fn build_query(follow_children: FollowLinksDirective, follow_refs: FollowLinksDirective) -> String {
    let (target, linker) = if is_shell(follow_children, follow_refs) {
        ("page", String::new())
    } else {
        ("node", " (linker ?node ?page)".to_string())
    };
    format!(
        "[:find (pull ?{target} [*]) \
         :in $ ?target_page_title % \
         :where [?page :node/title ?target_page_title]{linker}]"
    )
}

/// The `linker` rule set, `[]` for a shell query.
pub fn build_rules(follow_children: FollowLinksDirective, follow_refs: FollowLinksDirective) -> String {
    if is_shell(follow_children, follow_refs) {
        return "[]".to_string();
    }

    let follows = |d: FollowLinksDirective| d != FollowLinksDirective::DontFollow;
    let deep = |d: FollowLinksDirective| d == FollowLinksDirective::Deep;

    let mut proximate = Vec::new();
    if follows(follow_refs) {
        proximate.push("[?a :block/refs ?b]");
    }
    if follows(follow_children) {
        proximate.push("[?a :block/children ?b]");
    }

    let mut inductive = Vec::new();
    if deep(follow_refs) {
        inductive.push("[?proximate_linker :block/refs ?b]");
    }
    if deep(follow_children) {
        inductive.push("[?proximate_linker :block/children ?b]");
    }

    let mut rules = format!("[[(linker ?b ?a) (or {})]", proximate.join(" "));
    if !inductive.is_empty() {
        rules.push_str(&format!(
            " [(linker ?b ?a) (or {}) (linker ?proximate_linker ?a)]",
            inductive.join(" ")
        ));
    }
    rules.push(']');
    rules
}
