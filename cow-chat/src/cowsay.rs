//! Speech-bubble rendering for chat messages.
//!
//! The figure names double as the identity catalog of the chat: a client logs
//! in *as* one of these figures and every message it sends is said by it.

/// Column at which bubble text wraps.
const WRAP_WIDTH: usize = 40;

/// Figure used when a message has no sender to speak for it.
pub const DEFAULT_FIGURE: &str = "default";

/// A named ASCII figure. `\` in the first lines of the art is the line
/// connecting the figure to its bubble.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Figure {
    pub name: &'static str,
    art: &'static str,
}

impl Figure {
    pub fn art(&self) -> &'static str {
        self.art.trim_start_matches('\n').trim_end()
    }
}

const FIGURES: &[Figure] = &[
    Figure {
        name: "bunny",
        art: r"
  \
   \   \
        \ /\
        ( )
      .( o ).",
    },
    Figure {
        name: "daemon",
        art: r"
   \         ,        ,
    \       /(        )`
     \      \ \___   / |
            /- _  `-/  '
           (/\/ \ \   /\
           / /   | `    \
           O O   ) /    |
           `-^--'`<     '
          (_.)  _  )   /
           `.___/`    /
             `-----' /
<----.     __ / __   \
<----|====O)))==) \) /====
<----'    `--' `.__,' \
             |        |
              \       /
        ______( (_  / \______
      ,'  ,-----'   |        \
      `--{__________)        \/",
    },
    Figure {
        name: "default",
        art: r"
        \   ^__^
         \  (oo)\_______
            (__)\       )\/\
                ||----w |
                ||     ||",
    },
    Figure {
        name: "duck",
        art: r"
 \
  \
   \ >()_
      (__)__ _",
    },
    Figure {
        name: "elephant",
        art: r"
 \     /\  ___  /\
  \   // \/   \/ \\
     ((    O O    ))
      \\ /     \ //
       \/  | |  \/
        |  | |  |
        |  | |  |
        |   o   |
        | |   | |
        |m|   |m|",
    },
    Figure {
        name: "head-in",
        art: r"
    \
     \
    ^__^         /
    (oo)\_______/  _________
    (__)\       )=(  ____|_ \_____
        ||----w |  \ \     \_____ |
        ||     ||   ||           ||",
    },
    Figure {
        name: "hellokitty",
        art: r"
  \
   \
      /\_)o<
     |      \
     | O . O|
      \_____/",
    },
    Figure {
        name: "kitty",
        art: r"
     \
      \   /\_/\
         ( o.o )
          > ^ <
         /     \
        (_)---(_)",
    },
    Figure {
        name: "koala",
        art: r"
  \
   \
       ___
     {~._.~}
      ( Y )
     ()~*~()
     (_)-(_)",
    },
    Figure {
        name: "milk",
        art: r"
   \    _________
    \  |  MILK   |
       |---------|
       |  o   o  |
       |    <    |
       |  \___/  |
       |_________|
         |     |
        _|     |_",
    },
    Figure {
        name: "moose",
        art: r"
  \
   \   \_\_    _/_/
    \      \__/
           (oo)\_______
           (__)\       )\/\
               ||----w |
               ||     ||",
    },
    Figure {
        name: "pig",
        art: r"
     \     _
      \   (_)___
           (oo)  \____
           (__)       )~
             ||----||
             ^^    ^^",
    },
    Figure {
        name: "sheep",
        art: r"
  \
   \
       __
      UooU\.'@@@@@@`.
      \__/(@@@@@@@@@@)
           (@@@@@@@@)
           `YY~~~~YY'
            ||    ||",
    },
    Figure {
        name: "small",
        art: r"
       \   ,__,
        \  (..)____
           (__)    )\
              ||--|| *",
    },
    Figure {
        name: "snowman",
        art: r#"
   \
 ___###
   /oo\ |||
   \  / \|/
   /""\  I
  |    | I
  `----' I"#,
    },
    Figure {
        name: "supermilker",
        art: r"
  \   ^__^
   \  (oo)\_______        ________
      (__)\       )\/\    |Super |
          ||----W |       |Milker|
          ||    UDDDDDDDDD|______|",
    },
    Figure {
        name: "three-eyes",
        art: r"
        \  ^___^
         \ (ooo)\_______
           (___)\       )\/\
                ||----w |
                ||     ||",
    },
    Figure {
        name: "tux",
        art: r"
   \
    \
        .--.
       |o_o |
       |:_/ |
      //   \ \
     (|     | )
    /'\_   _/`\
    \___)=(___/",
    },
    Figure {
        name: "udder",
        art: r"
  \
   \    (__)
        o o\
       ('') \---------
          \           \
           |          |\
           ||---(  )_|| *
           ||    UU  ||
           ==        ==",
    },
    Figure {
        name: "www",
        art: r"
        \   ^__^
         \  (oo)\_______
            (__)\       )\/\
                ||--WWW |
                ||     ||",
    },
];

/// Looks up a figure by its exact, case-sensitive name.
pub fn figure(name: &str) -> Option<&'static Figure> {
    FIGURES.iter().find(|figure| figure.name == name)
}

/// Names of every figure, which is also the set of identities a client can
/// log in as.
pub fn names() -> impl Iterator<Item = &'static str> {
    FIGURES.iter().map(|figure| figure.name)
}

/// Renders `text` in a bubble said by the figure called `name`.
///
/// Unknown names fall back to [`DEFAULT_FIGURE`]. The result spans several
/// lines joined with `\n` and carries no trailing newline.
pub fn render(text: &str, name: &str) -> String {
    let figure = figure(name)
        .or_else(|| figure(DEFAULT_FIGURE))
        .map(Figure::art)
        .unwrap_or_default();

    let mut rendered = bubble(&wrap(text, WRAP_WIDTH));
    rendered.push('\n');
    rendered.push_str(figure);
    rendered
}

fn bubble(lines: &[String]) -> String {
    let width = lines
        .iter()
        .map(|line| line.chars().count())
        .max()
        .unwrap_or(0);

    let mut out = Vec::with_capacity(lines.len() + 2);
    out.push(format!(" {}", "_".repeat(width + 2)));

    let last = lines.len().saturating_sub(1);
    for (index, line) in lines.iter().enumerate() {
        let (open, close) = match (lines.len(), index) {
            (1, _) => ('<', '>'),
            (_, 0) => ('/', '\\'),
            (_, i) if i == last => ('\\', '/'),
            _ => ('|', '|'),
        };
        let padding = width - line.chars().count();
        out.push(format!("{open} {line}{} {close}", " ".repeat(padding)));
    }

    out.push(format!(" {}", "-".repeat(width + 2)));
    out.join("\n")
}

/// Greedy word wrap. Words longer than `width` are split into chunks.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        for chunk in chunks(word, width) {
            let needed = if current.is_empty() {
                chunk.chars().count()
            } else {
                current.chars().count() + 1 + chunk.chars().count()
            };
            if needed > width && !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(&chunk);
        }
    }

    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

fn chunks(word: &str, width: usize) -> Vec<String> {
    let chars: Vec<char> = word.chars().collect();
    chars
        .chunks(width.max(1))
        .map(|chunk| chunk.iter().collect())
        .collect()
}
