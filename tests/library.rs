//! Library registration, retrieval, fallback and concurrency.

use llt::{
    ident, lang, model, parse_str, RuntimeError, Template, TemplateLibrary,
};
use serde_json::json;
use std::sync::Arc;

fn seeded() -> llt::TemplateSet {
    parse_str(
        "@template greeting { plain }\n\
         @template greeting { @metadata { lang: 'en' } english }\n\
         @template greeting { @metadata { lang: 'en', model: 'gpt-4' } tuned }\n\
         @template greeting { @metadata { lang: 'ru' } russian }",
    )
    .unwrap()
}

fn body_of(template: &Arc<Template>) -> String {
    match &**template {
        Template::Prompt(prompt) => prompt.render(json!({})).unwrap(),
        _ => panic!("expected a text template"),
    }
}

#[test]
fn most_specific_template_survives_intersection() {
    let set = seeded();
    let library = set.library();

    let tuned = library
        .retrieve_named("greeting", &[lang("en"), model("gpt-4")])
        .unwrap();
    assert_eq!(body_of(&tuned), "tuned");

    let english = library.retrieve_named("greeting", &[lang("en")]).unwrap();
    assert_eq!(body_of(&english), "english");

    let plain = library.retrieve_named("greeting", &[]).unwrap();
    assert_eq!(body_of(&plain), "plain");
}

#[test]
fn strict_retrieval_fails_on_unmatched_constraint() {
    let set = seeded();
    assert!(matches!(
        set.library().retrieve_named("greeting", &[lang("de")]),
        Err(RuntimeError::TemplateNotFound(_)),
    ));
    assert!(set.library().try_retrieve(&[ident("absent")]).is_none());
}

#[test]
fn best_effort_keeps_the_last_nonempty_candidates() {
    let set = seeded();
    let fallback = set
        .library()
        .retrieve_named_best("greeting", &[model("claude")])
        .unwrap();
    // The model constraint matched nothing; the name matches survive.
    assert_eq!(body_of(&fallback), "plain");
}

#[test]
fn language_fallback_picks_a_major_language() {
    let set = parse_str("@template greeting { @metadata { lang: 'en' } english }").unwrap();
    let found = set
        .library()
        .retrieve_named_with_fallback("greeting", &[lang("fr")])
        .unwrap();
    assert_eq!(body_of(&found), "english");
}

#[test]
fn language_fallback_prefers_the_super_language() {
    let set = parse_str(
        "@template t { @metadata { lang: 'ru' } russian }\n\
         @template t { @metadata { lang: 'en' } english }",
    )
    .unwrap();
    let found = set
        .library()
        .retrieve_named_with_fallback("t", &[lang("en-us")])
        .unwrap();
    assert_eq!(body_of(&found), "english");
}

#[test]
fn fallback_never_invents_a_match() {
    let set = parse_str("@template t { @metadata { lang: 'en' } english }").unwrap();
    // Identifier has no fallback scheme: a wrong name still fails.
    assert!(set
        .library()
        .retrieve_named_with_fallback("other", &[lang("en")])
        .is_err());
}

#[test]
fn retrieve_all_returns_every_match_in_order() {
    let set = seeded();
    let all = set.library().retrieve_all(&[ident("greeting")]).unwrap();
    assert_eq!(all.len(), 4);
    let narrowed = set
        .library()
        .retrieve_all(&[ident("greeting"), lang("en")])
        .unwrap();
    assert_eq!(narrowed.len(), 2);
    assert_eq!(body_of(&narrowed[0]), "english");
    assert_eq!(body_of(&narrowed[1]), "tuned");
}

#[test]
fn adding_is_monotonic_for_retrievals() {
    let set = seeded();
    let library = set.library();
    let before = library.retrieve_all(&[ident("greeting")]).unwrap();

    let extra = parse_str("@template greeting { @metadata { lang: 'sv' } swedish }").unwrap();
    library.add(extra[0].clone()).unwrap();

    let after = library.retrieve_all(&[ident("greeting")]).unwrap();
    assert_eq!(after.len(), before.len() + 1);
    for held in &before {
        assert!(after.iter().any(|t| Arc::ptr_eq(t, held)));
    }
}

#[test]
fn duplicate_registration() {
    let set = seeded();
    let library = TemplateLibrary::new();
    assert!(library.add(set[0].clone()).is_ok());
    assert!(matches!(
        library.add(set[0].clone()),
        Err(RuntimeError::DuplicateTemplate(_)),
    ));
    assert!(!library.try_add(set[0].clone()));
    // try_add_range skips the template that is already registered.
    assert_eq!(library.try_add_range(set.iter().cloned()), 3);
    assert_eq!(library.len(), 4);
}

#[test]
fn import_str_registers_everything() {
    let library = TemplateLibrary::new();
    let count = library
        .import_str("@template a { A }\n@template b { B }")
        .unwrap();
    assert_eq!(count, 2);
    assert!(library.try_retrieve_named("a", &[]).is_some());
    assert!(library.try_retrieve_named("b", &[]).is_some());
}

#[test]
fn import_reader_uses_the_parser_registry() {
    let library = TemplateLibrary::new();
    let source = "@template c { C }".as_bytes();
    assert_eq!(library.import_reader(source, "llt").unwrap(), 1);
    assert!(matches!(
        library.import_reader("x".as_bytes(), "jinja"),
        Err(llt::ImportError::UnknownLanguage(_)),
    ));
}

#[test]
fn imported_siblings_resolve_through_the_importing_library() {
    let library = TemplateLibrary::new();
    library
        .import_str("@template outer { @render 'inner' }")
        .unwrap();
    library.import_str("@template inner { deep }").unwrap();
    let outer = library.retrieve_named("outer", &[]).unwrap();
    assert_eq!(body_of(&outer), "deep");
}

#[test]
fn plaintext_templates_render_verbatim() {
    let library = TemplateLibrary::new();
    library
        .add(Template::plaintext(Some("blurb"), "As is.\n"))
        .unwrap();
    library
        .import_str("@template page { Intro: @render 'blurb' }")
        .unwrap();
    let page = library.retrieve_named("page", &[]).unwrap();
    assert_eq!(body_of(&page), "Intro: As is.");
}

#[test]
fn shared_library_backs_render_lookup() {
    // Unique name: the shared library is process-wide state.
    TemplateLibrary::shared()
        .import_str("@template shared_footer_a7 { sincerely, llt }")
        .unwrap();
    let set = parse_str("@template t { @render 'shared_footer_a7' }").unwrap();
    let out = set.prompt("t").unwrap().render(json!({})).unwrap();
    assert_eq!(out, "sincerely, llt");
}

#[test]
fn concurrent_add_and_retrieve() {
    let library = TemplateLibrary::new();
    let mut handles = Vec::new();
    for i in 0..8 {
        let library = library.clone();
        handles.push(std::thread::spawn(move || {
            let source = format!("@template worker_{} {{ {} }}", i, i);
            library.import_str(&source).unwrap();
            // Whatever is registered by now must be retrievable.
            for j in 0..=i {
                if let Some(found) =
                    library.try_retrieve_named(&format!("worker_{}", j), &[])
                {
                    assert_eq!(found.name(), Some(format!("worker_{}", j).as_str()));
                }
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(library.len(), 8);
    for i in 0..8 {
        assert!(library.try_retrieve_named(&format!("worker_{}", i), &[]).is_some());
    }
}

#[test]
fn metadata_surface() {
    use llt::{Identifier, Language, MetadataCollection, TargetModel};
    let set = seeded();
    let tuned = set
        .library()
        .retrieve_named("greeting", &[lang("en"), model("gpt-4")])
        .unwrap();
    let metadata: &MetadataCollection = tuned.metadata();
    assert!(metadata.has::<Identifier>());
    assert_eq!(
        metadata.try_get::<TargetModel>(),
        Some(&TargetModel("gpt-4".into())),
    );
    assert_eq!(metadata.try_get::<Language>(), Some(&Language::new("en")));
    assert!(metadata
        .require::<Identifier>("templates need names here")
        .is_ok());
}
