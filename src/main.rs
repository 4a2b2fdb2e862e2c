use anyhow::{Context, Result};
use documentdb_gateway::{FilterSpec, QueryBuilder, QueryOptions, StoreConfig};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::Path;
use tracing_subscriber::EnvFilter;

const CONFIG_FILE: &str = "store.json";

const HELP: &str = r#"输入一个 JSON 过滤对象即可生成查询, 例如:
  {"type": "user", "age": ["gte(18)", "lt(65)"], "address.country": ["SE", "NO"]}

命令:
  :options <json>   设置查询选项, 例如 :options {"LIMIT": 10, "ORDERBY": "age", "SORTBY": "DESC"}
  :options          清除查询选项
  :wrap <attr>      把字段路径放到包装属性下, 例如 :wrap data
  :wrap             取消包装属性
  :help             显示帮助
  :quit             退出"#;

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_target(false)
        .compact()
        .with_env_filter(filter)
        .init();
}

/// 创建查询构建器，优先使用 store.json 中的包装属性，失败时使用默认配置
///
/// REPL 不连接数据库, 所以这里不要求 host/masterKey 等连接字段。
fn create_builder_with_config() -> QueryBuilder {
    if !Path::new(CONFIG_FILE).exists() {
        return QueryBuilder::new();
    }
    match StoreConfig::read_json_file(CONFIG_FILE) {
        Ok(config) => {
            println!("✅ 成功从 {} 加载配置", CONFIG_FILE);
            match config.data_attribute() {
                Some(attribute) => QueryBuilder::with_data_attribute(attribute),
                None => QueryBuilder::new(),
            }
        }
        Err(e) => {
            tracing::info!(error = %e, "ignoring store config, using defaults");
            QueryBuilder::new()
        }
    }
}

/// REPL 的当前状态
struct Session {
    builder: QueryBuilder,
    options: QueryOptions,
}

impl Session {
    /// 处理一行输入; 返回 false 表示退出
    fn handle(&mut self, line: &str) -> Result<bool> {
        let (command, rest) = match line.split_once(char::is_whitespace) {
            Some((command, rest)) => (command, rest.trim()),
            None => (line, ""),
        };

        match command {
            ":quit" | ":q" => return Ok(false),
            ":help" => println!("{}", HELP),
            ":options" => {
                self.options = if rest.is_empty() {
                    QueryOptions::default()
                } else {
                    QueryOptions::from_json_str(rest).context("无法解析查询选项")?
                };
                println!("选项: {:?}", self.options);
            }
            ":wrap" => {
                self.builder = QueryBuilder::with_data_attribute(rest);
                match self.builder.data_attribute() {
                    Some(attribute) => println!("字段路径包装在 {} 下", attribute),
                    None => println!("取消包装属性"),
                }
            }
            _ if line.starts_with(':') => println!("未知命令: {} (输入 :help 查看帮助)", command),
            _ => {
                let spec = FilterSpec::from_json_str(line).context("无法解析过滤规格")?;
                let query = self.builder.build(&spec, &self.options);
                println!("\n[生成的查询]:\n{}", query.query);
                if !query.parameters.is_empty() {
                    println!("\n[参数]:");
                    println!("{}", serde_json::to_string_pretty(&query.parameters)?);
                }
                println!();
            }
        }
        Ok(true)
    }
}

fn main() -> Result<()> {
    init_logging();

    println!("--- DocumentDB 查询构建器: JSON 过滤规格到 SQL ---");
    println!("输入 :help 查看帮助\n");

    let mut session = Session {
        builder: create_builder_with_config(),
        options: QueryOptions::default(),
    };
    let mut editor = DefaultEditor::new().context("无法初始化行编辑器")?;

    loop {
        match editor.readline("filter> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(line);
                match session.handle(line) {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(e) => println!("✗ {:#}", e),
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e).context("读取输入失败"),
        }
    }

    Ok(())
}
