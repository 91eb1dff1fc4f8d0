//! End-to-end rendering of messages templates.

use llt::{parse_str, Message, Role, RuntimeError};
use serde_json::json;

#[test]
fn system_then_interpolated_users() {
    let source = "@messages template m {\n\
                  @system message { You are a helpful assistant. }\n\
                  @foreach name in names {\n\
                  @message { @role 'user' Hello, i am @name! }\n\
                  }\n\
                  }";
    let set = parse_str(source).unwrap();
    let rendered = set
        .messages("m")
        .unwrap()
        .render(json!({"names": ["Alex", "Rob"]}))
        .unwrap();
    assert_eq!(
        rendered,
        vec![
            Message::new(Role::System, "You are a helpful assistant."),
            Message::new(Role::User, "Hello, i am Alex!"),
            Message::new(Role::User, "Hello, i am Rob!"),
        ],
    );
}

#[test]
fn fixed_role_entries_in_order() {
    let source = "@messages template m {\n\
                  @system message { rules }\n\
                  @user message { question }\n\
                  @assistant message { answer }\n\
                  }";
    let set = parse_str(source).unwrap();
    let rendered = set.messages("m").unwrap().render(json!({})).unwrap();
    let roles: Vec<Role> = rendered.iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant]);
}

#[test]
fn computed_role_from_context() {
    let source = "@messages template m { @message { @role speaker Text. } }";
    let set = parse_str(source).unwrap();
    let rendered = set
        .messages("m")
        .unwrap()
        .render(json!({"speaker": "assistant"}))
        .unwrap();
    assert_eq!(rendered, vec![Message::new(Role::Assistant, "Text.")]);
}

#[test]
fn tool_role_is_reserved() {
    let source = "@messages template m { @tool message { payload } }";
    let set = parse_str(source).unwrap();
    assert_eq!(
        set.messages("m").unwrap().render(json!({})),
        Err(RuntimeError::ToolNotSupported),
    );
}

#[test]
fn unknown_role_is_rejected() {
    let source = "@messages template m { @message { @role 'oracle' hm } }";
    let set = parse_str(source).unwrap();
    assert_eq!(
        set.messages("m").unwrap().render(json!({})),
        Err(RuntimeError::InvalidRole("oracle".into())),
    );
}

#[test]
fn conditional_messages() {
    let source = "@messages template m {\n\
                  @if verbose { @system message { Explain everything. } }\n\
                  else { @system message { Be terse. } }\n\
                  @user message { hi }\n\
                  }";
    let set = parse_str(source).unwrap();
    let terse = set.messages("m").unwrap().render(json!({"verbose": false})).unwrap();
    assert_eq!(terse[0].content, "Be terse.");
    let verbose = set.messages("m").unwrap().render(json!({"verbose": true})).unwrap();
    assert_eq!(verbose[0].content, "Explain everything.");
    assert_eq!(terse.len(), 2);
}

#[test]
fn let_between_messages() {
    let source = "@messages template m {\n\
                  @let greeting = 'Hej'\n\
                  @user message { @greeting! }\n\
                  }";
    let set = parse_str(source).unwrap();
    let rendered = set.messages("m").unwrap().render(json!({})).unwrap();
    assert_eq!(rendered, vec![Message::new(Role::User, "Hej!")]);
}

#[test]
fn message_bodies_use_text_statements() {
    let source = "@messages template m {\n\
                  @user message { Items:\n\
                  @foreach x in items { - @x\n\
                  }\n\
                  }\n\
                  }";
    let set = parse_str(source).unwrap();
    let rendered = set
        .messages("m")
        .unwrap()
        .render(json!({"items": ["a", "b"]}))
        .unwrap();
    assert_eq!(rendered[0].content, "Items:\n- a\n- b");
}

#[test]
fn nested_messages_render() {
    let source = "@messages template outer {\n\
                  @system message { first }\n\
                  @render 'tail'\n\
                  }\n\
                  @messages template tail { @user message { last } }";
    let set = parse_str(source).unwrap();
    let rendered = set.messages("outer").unwrap().render(json!({})).unwrap();
    assert_eq!(rendered.len(), 2);
    assert_eq!(rendered[1], Message::new(Role::User, "last"));
}

#[test]
fn text_template_in_messages_context_fails() {
    let source = "@messages template m { @render 'plain' }\n\
                  @template plain { hi }";
    let set = parse_str(source).unwrap();
    assert_eq!(
        set.messages("m").unwrap().render(json!({})),
        Err(RuntimeError::TemplateKindMismatch {
            expected: "messages",
            actual: "text",
        }),
    );
}
