use std::sync::Arc;

use stratum_core::error::{Result, StratumError};
use stratum_core::migration::{FileKind, MigrationFile};
use tracing::{debug, info, warn};

use super::reconcile::Direction;
use super::script::ScriptRegistry;
use super::LogSink;
use crate::db::Connection;

/// What running one migration file did.
#[derive(Debug)]
pub struct ExecutionReport {
    pub file: String,
    /// Statements attempted (1 for a script).
    pub statements: usize,
    /// Statements that failed without stopping the batch.
    pub failures: Vec<StratumError>,
}

/// Runs the body of a single migration file.
///
/// Statement batches are best-effort: each statement commits on its own and
/// a failing one is reported while the rest of the batch still runs. Scripts
/// succeed or fail as a whole.
pub struct ScriptExecutor {
    conn: Arc<dyn Connection>,
    scripts: ScriptRegistry,
    sink: LogSink,
}

impl ScriptExecutor {
    pub fn new(conn: Arc<dyn Connection>, scripts: ScriptRegistry, sink: LogSink) -> Self {
        Self {
            conn,
            scripts,
            sink,
        }
    }

    /// Execute `file` in the given direction.
    pub async fn run(&self, file: &MigrationFile, direction: Direction) -> Result<ExecutionReport> {
        self.sink.log(&format!("Execute [{}]", file.name));
        info!("Executing migration {} ({})", file.name, direction);

        match file.kind {
            FileKind::Script => self.run_script(file, direction).await,
            FileKind::Up | FileKind::Down => self.run_batch(file).await,
        }
    }

    async fn run_batch(&self, file: &MigrationFile) -> Result<ExecutionReport> {
        let content = tokio::fs::read_to_string(&file.path).await?;
        let statements = split_sql_statements(&content.replace("\r\n", "\n"));

        let mut report = ExecutionReport {
            file: file.name.clone(),
            statements: statements.len(),
            failures: Vec::new(),
        };

        for (i, statement) in statements.iter().enumerate() {
            if let Err(e) = self.conn.execute(statement, &[]).await {
                let failure = StratumError::Statement {
                    file: file.name.clone(),
                    index: i + 1,
                    message: e.to_string(),
                };
                warn!("{}", failure);
                self.sink.error(&failure);
                report.failures.push(failure);
            }
        }

        debug!(
            "Executed {} statement(s) from {}, {} failed",
            report.statements,
            file.name,
            report.failures.len()
        );
        Ok(report)
    }

    async fn run_script(&self, file: &MigrationFile, direction: Direction) -> Result<ExecutionReport> {
        match self.scripts.get(&file.name) {
            Some(script) => match direction {
                Direction::Up => script.up(self.conn.as_ref()).await?,
                Direction::Down => script.down(self.conn.as_ref()).await?,
            },
            None => warn!("No script registered for {}, nothing to run", file.name),
        }

        Ok(ExecutionReport {
            file: file.name.clone(),
            statements: 1,
            failures: Vec::new(),
        })
    }
}

/// Split SQL into individual statements on `;`.
///
/// Semicolons inside quoted strings, identifiers, comments and PostgreSQL
/// dollar-quoted bodies (`$$ ... $$`, `$tag$ ... $tag$`) do not split.
/// Blank and comment-only statements are dropped.
pub fn split_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut dollar_tag: Option<(String, usize)> = None;
    let mut line_comment = false;
    let mut block_comment = false;
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);

        if line_comment {
            line_comment = c != '\n';
            continue;
        }

        if block_comment {
            if c == '*' && chars.peek() == Some(&'/') {
                chars.next();
                current.push('/');
                block_comment = false;
            }
            continue;
        }

        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }

        if let Some((tag, body_start)) = &dollar_tag {
            // Closing tag must not overlap the opening one
            if c == '$' && current.len() >= body_start + tag.len() && current.ends_with(tag.as_str())
            {
                dollar_tag = None;
            }
            continue;
        }

        match c {
            '\'' | '"' | '`' => quote = Some(c),
            '-' if chars.peek() == Some(&'-') => line_comment = true,
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                current.push('*');
                block_comment = true;
            }
            '$' => {
                let mut tag = String::from("$");
                while let Some(&next) = chars.peek() {
                    if next.is_alphanumeric() || next == '_' {
                        tag.push(next);
                        current.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if chars.peek() == Some(&'$') && !tag[1..].starts_with(|d: char| d.is_ascii_digit())
                {
                    chars.next();
                    tag.push('$');
                    current.push('$');
                    dollar_tag = Some((tag, current.len()));
                }
            }
            ';' => {
                push_statement(&mut statements, &current);
                current.clear();
            }
            _ => {}
        }
    }

    // Last statement might not end with ;
    push_statement(&mut statements, &current);

    statements
}

fn push_statement(statements: &mut Vec<String>, raw: &str) {
    let statement = raw.trim().trim_end_matches(';').trim();

    if !comment_only(statement) {
        statements.push(statement.to_string());
    }
}

/// True when nothing but `--` and `/* */` comments remain.
fn comment_only(statement: &str) -> bool {
    let mut rest = statement;
    loop {
        rest = rest.trim_start();
        if let Some(after) = rest.strip_prefix("--") {
            rest = after.split_once('\n').map_or("", |(_, tail)| tail);
        } else if let Some(after) = rest.strip_prefix("/*") {
            rest = after.split_once("*/").map_or("", |(_, tail)| tail);
        } else {
            return rest.is_empty();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::script::ScriptMigration;
    use crate::testing::{capture_sink, write_migration, MockConnection};
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn migration(dir: &Path, name: &str) -> MigrationFile {
        MigrationFile::from_path(&dir.join(name), "rs").unwrap()
    }

    #[test]
    fn test_split_simple_statements() {
        let stmts = split_sql_statements("SELECT 1; SELECT 2; SELECT 3;");
        assert_eq!(stmts, vec!["SELECT 1", "SELECT 2", "SELECT 3"]);
    }

    #[test]
    fn test_split_skips_blank_and_comment_only() {
        let sql = "\n;\n  ;\n-- nothing here\n;\nSELECT 1;\n-- trailing comment\n";
        assert_eq!(split_sql_statements(sql), vec!["SELECT 1"]);
    }

    #[test]
    fn test_split_skips_block_comment_only() {
        let sql = "/* note */;\n/* one */ -- two\n/* three */;\n/* lead */ SELECT 1;";
        assert_eq!(split_sql_statements(sql), vec!["/* lead */ SELECT 1"]);
    }

    #[test]
    fn test_split_last_statement_without_terminator() {
        let stmts = split_sql_statements("CREATE TABLE a (id INT);\nINSERT INTO a VALUES (1)");
        assert_eq!(stmts.len(), 2);
        assert_eq!(stmts[1], "INSERT INTO a VALUES (1)");
    }

    #[test]
    fn test_split_respects_quotes_and_comments() {
        let sql = "INSERT INTO t VALUES ('a;b', \"c;d\");\n\
                   -- not; a split\n\
                   /* nor; this */ SELECT 2;";
        let stmts = split_sql_statements(sql);
        assert_eq!(stmts.len(), 2);
        assert_eq!(stmts[0], "INSERT INTO t VALUES ('a;b', \"c;d\")");
        assert!(stmts[1].ends_with("SELECT 2"));
    }

    #[test]
    fn test_split_with_dollar_quoted_function() {
        let sql = r#"
CREATE FUNCTION test() RETURNS void AS $$
BEGIN
    SELECT 1;
    SELECT 2;
END;
$$ LANGUAGE plpgsql;

SELECT 3;
"#;
        let stmts = split_sql_statements(sql);
        assert_eq!(stmts.len(), 2);
        assert!(stmts[0].contains("CREATE FUNCTION"));
        assert!(stmts[0].contains("$$ LANGUAGE plpgsql"));
        assert!(stmts[1].contains("SELECT 3"));
    }

    #[test]
    fn test_split_with_named_dollar_tag_and_params() {
        let sql = "CREATE FUNCTION f() RETURNS int AS $body$ SELECT 1; $body$ LANGUAGE sql;\n\
                   PREPARE p AS SELECT $1; EXECUTE p(1);";
        let stmts = split_sql_statements(sql);
        assert_eq!(stmts.len(), 3);
        assert!(stmts[0].ends_with("$body$ LANGUAGE sql"));
        assert_eq!(stmts[1], "PREPARE p AS SELECT $1");
    }

    #[tokio::test]
    async fn test_batch_continues_after_failed_statement() {
        let dir = TempDir::new().unwrap();
        write_migration(
            dir.path(),
            "20230101000000_up.sql",
            "CREATE TABLE a (id INT);\r\nINSERT INTO missing VALUES (1);\r\nCREATE TABLE c (id INT);\r\n",
        )
        .unwrap();

        let db = MockConnection::new();
        db.fail_on("missing");
        let (sink, messages) = capture_sink();
        let executor = ScriptExecutor::new(Arc::new(db.clone()), ScriptRegistry::new(), sink);

        let report = executor
            .run(&migration(dir.path(), "20230101000000_up.sql"), Direction::Up)
            .await
            .unwrap();

        assert_eq!(report.statements, 3);
        assert_eq!(report.failures.len(), 1);
        assert!(matches!(
            report.failures[0],
            StratumError::Statement { index: 2, .. }
        ));
        assert_eq!(
            db.executed(),
            vec![
                "CREATE TABLE a (id INT)",
                "INSERT INTO missing VALUES (1)",
                "CREATE TABLE c (id INT)",
            ]
        );

        let messages = messages.lock().unwrap();
        assert_eq!(messages[0], "Execute [20230101000000_up.sql]");
        assert!(messages[1].starts_with("Error : Statement 2 of [20230101000000_up.sql]"));
    }

    #[tokio::test]
    async fn test_batch_missing_file_is_fatal() {
        let dir = TempDir::new().unwrap();
        let executor = ScriptExecutor::new(
            Arc::new(MockConnection::new()),
            ScriptRegistry::new(),
            LogSink::default(),
        );

        let file = migration(dir.path(), "20230101000000_up.sql");
        let err = executor.run(&file, Direction::Up).await.unwrap_err();
        assert!(matches!(err, StratumError::Io(_)));
    }

    struct Counting {
        ups: Arc<AtomicUsize>,
        fail_down: bool,
    }

    #[async_trait]
    impl ScriptMigration for Counting {
        async fn up(&self, db: &dyn Connection) -> Result<()> {
            db.execute("CREATE TABLE scripted (id INT)", &[]).await?;
            self.ups.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn down(&self, _db: &dyn Connection) -> Result<()> {
            if self.fail_down {
                return Err(StratumError::Migration("cannot revert".into()));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_script_runs_registered_entry_point() {
        let dir = TempDir::new().unwrap();
        let ups = Arc::new(AtomicUsize::new(0));
        let mut scripts = ScriptRegistry::new();
        scripts.register(
            "20230101000000-seed.rs",
            Counting {
                ups: ups.clone(),
                fail_down: true,
            },
        );

        let db = MockConnection::new();
        let executor = ScriptExecutor::new(Arc::new(db.clone()), scripts, LogSink::default());
        let file = migration(dir.path(), "20230101000000-seed.rs");

        let report = executor.run(&file, Direction::Up).await.unwrap();
        assert!(report.failures.is_empty());
        assert_eq!(ups.load(Ordering::SeqCst), 1);
        assert_eq!(db.executed(), vec!["CREATE TABLE scripted (id INT)"]);

        let err = executor.run(&file, Direction::Down).await.unwrap_err();
        assert!(err.to_string().contains("cannot revert"));
    }

    #[tokio::test]
    async fn test_unregistered_script_is_a_no_op() {
        let dir = TempDir::new().unwrap();
        let db = MockConnection::new();
        let (sink, messages) = capture_sink();
        let executor = ScriptExecutor::new(Arc::new(db.clone()), ScriptRegistry::new(), sink);

        let report = executor
            .run(&migration(dir.path(), "20230101000000.rs"), Direction::Up)
            .await
            .unwrap();

        assert_eq!(report.statements, 1);
        assert!(db.executed().is_empty());
        assert_eq!(messages.lock().unwrap()[0], "Execute [20230101000000.rs]");
    }
}
