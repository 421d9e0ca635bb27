use crate::db::models::MessageType;
use crate::llm::CompletionOptions;

pub const SQL_OPTIONS: CompletionOptions = CompletionOptions {
    temperature: 0.1,
    max_tokens: 1000,
    top_p: Some(0.9),
};

pub const SCHEMA_OPTIONS: CompletionOptions = CompletionOptions {
    temperature: 0.1,
    max_tokens: 2000,
    top_p: Some(0.9),
};

pub const CHAT_OPTIONS: CompletionOptions = CompletionOptions {
    temperature: 0.7,
    max_tokens: 500,
    top_p: None,
};

pub fn sql_system_prompt(database_type: &str) -> String {
    let dialect = database_type.to_uppercase();
    format!(
        r#"You are a SQL expert. Write one syntactically correct {dialect} query for the user's request.

### Rules:
- Return valid {dialect} SQL only, following {dialect} conventions
- Use {dialect} data types and functions
- Add comments when the query is complex
- Prefer readable, efficient queries and guard against obvious edge cases

### Response format:
Reply with a single JSON object and nothing else:
- sql_query: the generated SQL query
- explanation: a short description of what the query does
- tables_involved: list of the tables the query references
"#
    )
}

pub fn sql_user_prompt(prompt: &str, context: &str) -> String {
    let mut user_prompt = format!("Generate a SQL query for: {}", prompt);
    if !context.trim().is_empty() {
        user_prompt.push_str(&format!("\n\nContext: {}", context));
    }
    user_prompt
}

pub fn schema_system_prompt(database_type: &str) -> String {
    let dialect = database_type.to_uppercase();
    format!(
        r#"You are a database design expert. Design a complete schema in {dialect} DDL for the user's description.

### Rules:
- Create the tables the description needs, with their relationships
- Declare primary keys, foreign keys and useful indexes
- Use {dialect} data types, constraints and validations
- Comment non-obvious parts of the design
- Normalize sensibly and follow common database patterns

### Response format:
Reply with a single JSON object and nothing else:
- schema: the complete DDL statements
- explanation: a short explanation of the design
- tables: array of objects describing each table (name, columns, relationships)
- recommendations: further suggestions for optimization
"#
    )
}

pub fn schema_user_prompt(description: &str) -> String {
    format!("Generate a database schema for: {}", description)
}

pub fn chat_system_prompt(message_type: MessageType) -> String {
    let mut prompt = String::from(
        r#"You are the assistant inside SQLSense, a tool that turns natural language into SQL queries and database schemas.

You can help with:
- SQL concepts and syntax
- Improving existing queries
- Database design and schema changes
- General database questions

Keep answers short and practical."#,
    );

    match message_type {
        MessageType::General => {}
        MessageType::Schema => {
            prompt.push_str("\n\nThe user is asking about database schema design.")
        }
        MessageType::Query => prompt.push_str("\n\nThe user is asking about a SQL query."),
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_prompts_embed_dialect_and_context() {
        let system = sql_system_prompt("mysql");
        assert!(system.contains("MYSQL"));
        assert!(system.contains("sql_query"));
        assert!(system.contains("tables_involved"));

        assert_eq!(
            sql_user_prompt("list users", ""),
            "Generate a SQL query for: list users"
        );
        assert_eq!(
            sql_user_prompt("list users", "table users(id, age)"),
            "Generate a SQL query for: list users\n\nContext: table users(id, age)"
        );
    }

    #[test]
    fn test_schema_prompts() {
        let system = schema_system_prompt("sqlite");
        assert!(system.contains("SQLITE"));
        assert!(system.contains("recommendations"));
        assert_eq!(
            schema_user_prompt("a blog"),
            "Generate a database schema for: a blog"
        );
    }

    #[test]
    fn test_chat_prompt_mentions_topic() {
        assert!(chat_system_prompt(MessageType::Schema).contains("schema design"));
        assert!(chat_system_prompt(MessageType::Query).contains("SQL query"));
        assert!(!chat_system_prompt(MessageType::General).contains("The user is asking"));
    }
}
