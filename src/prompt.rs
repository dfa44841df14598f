//! Prompt assembly: system instruction plus user content per conversion

use crate::request::{Conversion, Part};

/// Drawing conventions shared by every TikZ/SVG request
pub const SYSTEM_INSTRUCTION: &str = "\
You are an expert author of mathematics and engineering documents and a master of TikZ and SVG.
Task: convert TikZ code to SVG, or the reverse, with absolute precision.

%% CORE GEOMETRY RULES %%
1. **Plane geometry**:
   - Use ONLY SOLID LINES for every line (altitudes, medians, bisectors, circles...).
   - NEVER use dashed, dotted or dash-dot lines.
2. **Solid (spatial) geometry**:
   - Use dashed lines only for hidden edges.
3. **Legend**:
   - Do NOT draw a legend or key unless asked. Put labels directly on the figure.

%% TIKZ TO SVG CONVERSION %%
When converting TikZ code to SVG:
- Reproduce TikZ coordinate calculations exactly (e.g. $(A)!(P)!(B)$ is a projection, $(A)!0.5!(B)$ is a midpoint).
- Make sure arrows, right-angle marks and labels are drawn in the right place.
- Always return a complete, standalone <svg> with a viewBox and a suitable width/height.
- Use a legible font for point labels.
";

/// Instruction used when reading a problem out of an image
pub const ANALYST_INSTRUCTION: &str
  = "You are an expert at analysing mathematics problems.";

/// Reference snippets sent with description requests
pub const TIKZ_SNIPPETS_CONTEXT: &str = r"% Triangle with an altitude and right-angle mark (plane: solid lines only)
\begin{tikzpicture}[line join=round, line cap=round]
  \coordinate[label=above:$A$] (A) at (1.5,3);
  \coordinate[label=below left:$B$] (B) at (0,0);
  \coordinate[label=below right:$C$] (C) at (5,0);
  \coordinate[label=below:$H$] (H) at ($(B)!(A)!(C)$);
  \draw (A)--(B)--(C)--cycle;
  \draw (A)--(H);
  \draw ($(H)!0.25cm!(C)$) -- ++(0,0.25) -- ($(H)+(0,0.25)$);
  \foreach \p in {A,B,C,H} \fill (\p) circle (1.2pt);
\end{tikzpicture}

% Midpoint and circumscribed circle
\begin{tikzpicture}
  \coordinate[label=left:$A$] (A) at (0,0);
  \coordinate[label=right:$B$] (B) at (4,0);
  \coordinate[label=below:$M$] (M) at ($(A)!0.5!(B)$);
  \draw (A)--(B);
  \draw (M) circle (2);
  \fill (M) circle (1.2pt);
\end{tikzpicture}

% Pyramid S.ABCD (spatial: dashed hidden edges only)
\begin{tikzpicture}[line join=round]
  \coordinate[label=below left:$A$] (A) at (0,0);
  \coordinate[label=below:$B$] (B) at (3,0);
  \coordinate[label=right:$C$] (C) at (4.2,1.2);
  \coordinate[label=left:$D$] (D) at (1.2,1.2);
  \coordinate[label=above:$S$] (S) at (2.1,4);
  \draw (S)--(A)--(B)--(C)--cycle (S)--(B);
  \draw[dashed] (A)--(D)--(C) (S)--(D);
\end{tikzpicture}";

/// Fully assembled prompt for one call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt
{   pub system_instruction: String
  , pub parts: Vec<Part>
}

/// Build the system instruction and user content for a conversion
pub fn build_prompt(conversion: &Conversion) -> Prompt
{   match conversion
    {   Conversion::DescriptionToTikz(description) => Prompt
        {   system_instruction: SYSTEM_INSTRUCTION.to_string()
          , parts: vec![Part::Text(format!(
              "Context Snippets:\n{}\n\n\
               Request: generate TikZ code for the following description: {}. \
               Remember the solid-line rule for plane figures.",
              TIKZ_SNIPPETS_CONTEXT, description
            ))]
        }
      , Conversion::ImageToDescription(image) => Prompt
        {   system_instruction: ANALYST_INSTRUCTION.to_string()
          , parts: vec![
              Part::InlineData(image.clone())
            , Part::Text(
                "Describe this geometry problem in detail so that I can \
                 convert it to TikZ. Distinguish plane figures (solid lines) \
                 from spatial figures."
                  .to_string()
              )
            ]
        }
      , Conversion::ImageToTikz(image) => Prompt
        {   system_instruction: SYSTEM_INSTRUCTION.to_string()
          , parts: vec![
              Part::InlineData(image.clone())
            , Part::Text(
                "Convert this image to TikZ code. Follow the rules: \
                 plane figure = solid lines, spatial figure = dashed lines \
                 for hidden edges."
                  .to_string()
              )
            ]
        }
      , Conversion::TikzToSvg(tikz) => Prompt
        {   system_instruction: SYSTEM_INSTRUCTION.to_string()
          , parts: vec![Part::Text(format!(
              "You are a TikZ to SVG compiler. Draw an SVG image from the \
               following TikZ code.\n\
               CRITICAL REQUIREMENTS:\n\
               1. Compute coordinates exactly, especially projections and midpoints.\n\
               2. Plane geometry: use SOLID LINES throughout. NO DASHED LINES.\n\
               3. Return only the <svg>...</svg> code. No explanatory text.\n\n\
               TikZ code to draw:\n{}",
              tikz
            ))]
        }
    }
}
