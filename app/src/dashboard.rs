use std::fmt::Write;

use sondeo::results::Sentiment;
use sondeo::{AggregateReport, RunStatus};

pub const INDEX_HTML: &str = r#"<!doctype html>
<html lang="es">
<head>
<meta charset="utf-8">
<title>sondeo</title>
<style>
body { font-family: sans-serif; max-width: 860px; margin: 2em auto; }
#logs { background: #111; color: #ddd; height: 320px; overflow-y: auto; padding: .5em; font: 12px monospace; }
.WARN { color: #e0b040; } .ERROR { color: #e06060; } .DEBUG { color: #888; }
progress { width: 100%; }
</style>
</head>
<body>
<h1>sondeo</h1>
<form id="start">
  <input name="topic" placeholder="tema, otro tema" required>
  <input name="items" type="number" min="1" placeholder="20">
  <button>Iniciar</button>
</form>
<p id="message"></p>
<p><span id="stage">-</span> <progress id="progress" max="100" value="0"></progress></p>
<div id="logs"></div>
<p><a id="dashboard" href="/dashboard" hidden>Ver resultados</a></p>
<script>
let since = 0;
document.getElementById('start').addEventListener('submit', async (ev) => {
  ev.preventDefault();
  const form = new FormData(ev.target);
  const body = { topic: form.get('topic') };
  if (form.get('items')) body.items_per_topic = Number(form.get('items'));
  const resp = await fetch('/start', {
    method: 'POST', headers: { 'Content-Type': 'application/json' }, body: JSON.stringify(body)
  });
  const data = await resp.json();
  document.getElementById('message').textContent = data.success ? 'Iniciado: ' + data.topic : data.error;
});
async function poll() {
  const status = await (await fetch('/status')).json();
  document.getElementById('stage').textContent = status.stage_label + (status.error ? ' - ' + status.error : '');
  document.getElementById('progress').value = status.progress_percent;
  document.getElementById('dashboard').hidden = !status.completed;
  const logs = await (await fetch('/logs?since=' + since)).json();
  const box = document.getElementById('logs');
  for (const e of logs.entries) {
    const line = document.createElement('div');
    line.className = e.level;
    line.textContent = e.timestamp.slice(11, 19) + ' ' + e.message;
    box.appendChild(line);
  }
  if (logs.entries.length) box.scrollTop = box.scrollHeight;
  since = logs.last_seq;
}
setInterval(poll, 1500);
poll();
</script>
</body>
</html>
"#;

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn percent(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 * 100.0 / total as f64
    }
}

/// Results page for a finished run.
pub fn render(report: &AggregateReport, status: &RunStatus) -> String {
    let mut html = String::new();
    let topic = status.topic.as_deref().unwrap_or("-");
    let tally = &report.global_sentiment;

    html.push_str("<!doctype html>\n<html lang=\"es\">\n<head><meta charset=\"utf-8\"><title>sondeo - resultados</title></head>\n<body>\n");
    let _ = writeln!(html, "<h1>Resultados: {}</h1>", escape(topic));

    html.push_str("<h2>Sentimiento global</h2>\n<table>\n");
    for sentiment in Sentiment::ALL {
        let count = tally.count(sentiment);
        let _ = writeln!(
            html,
            "<tr><td>{}</td><td>{}</td><td>{:.1}%</td></tr>",
            sentiment.label(),
            count,
            percent(count, tally.total)
        );
    }
    let _ = writeln!(html, "<tr><th>Total</th><th>{}</th><th></th></tr>\n</table>", tally.total);
    let _ = writeln!(
        html,
        "<p>Predominante: <strong>{}</strong></p>",
        report.predominant.label()
    );
    let _ = writeln!(html, "<p>{}</p>", escape(&report.global_interpretation));

    html.push_str("<h2>Por fuente</h2>\n");
    for (name, results) in &report.sources {
        let _ = writeln!(html, "<section>\n<h3>{}</h3>", escape(name));
        let _ = writeln!(
            html,
            "<p>{} positivos, {} negativos, {} neutrales</p>",
            results.tally.positive, results.tally.negative, results.tally.neutral
        );
        if let Some(text) = results
            .bundle
            .as_ref()
            .and_then(|b| b.interpretation.as_ref())
            .map(|i| i.text.as_str())
        {
            let _ = writeln!(html, "<blockquote>{}</blockquote>", escape(text));
        }
        html.push_str("</section>\n");
    }

    if let Some(summary) = &status.summary {
        let _ = writeln!(html, "<h2>Resumen</h2>\n<pre>{}</pre>", escape(&summary.to_string()));
    }
    html.push_str("</body>\n</html>\n");
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use sondeo::results::SourceResults;
    use sondeo::SentimentTally;

    #[test]
    fn test_escape() {
        assert_eq!(escape("<b>\"a\" & 'b'</b>"), "&lt;b&gt;&quot;a&quot; &amp; &#39;b&#39;&lt;/b&gt;");
    }

    #[test]
    fn test_render_lists_sources_and_escapes_text() {
        let mut sources = BTreeMap::new();
        sources.insert(
            "reddit".to_string(),
            SourceResults {
                tally: SentimentTally::new(1, 6, 0),
                ..SourceResults::default()
            },
        );
        let report = AggregateReport {
            sources,
            global_sentiment: SentimentTally::new(1, 6, 0),
            predominant: Sentiment::Negative,
            global_interpretation: "<script>".to_string(),
        };

        let html = render(&report, &RunStatus::default());
        assert!(html.contains("<h3>reddit</h3>"));
        assert!(html.contains("Predominante: <strong>NEGATIVO</strong>"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("<td>NEGATIVO</td><td>6</td><td>85.7%</td>"));
    }
}
